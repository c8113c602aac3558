//! Availability grouped for manual assignment

use std::collections::HashMap;

use poc_common::{Category, Publisher};
use serde::Serialize;
use uuid::Uuid;

const PARTNER_UNAVAILABLE_NOTE: &str = "Paired publisher available individually";

#[derive(Debug, Clone, Serialize)]
pub struct AvailableSolo {
    #[serde(flatten)]
    pub publisher: Publisher,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailableCouple {
    pub id: String,
    pub member1: Publisher,
    pub member2: Publisher,
    pub slots: u32,
}

/// Response shape of `GET /api/turnos/disponibles`
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupedAvailability {
    #[serde(rename = "solos")]
    pub individuals: Vec<AvailableSolo>,
    #[serde(rename = "matrimonios")]
    pub couples: Vec<AvailableCouple>,
    #[serde(rename = "menores")]
    pub minors: Vec<Publisher>,
}

/// Group available publishers; a couple is listed once when both are present
pub fn group_available(publishers: Vec<Publisher>) -> GroupedAvailability {
    let mut grouped = GroupedAvailability::default();
    let by_id: HashMap<Uuid, &Publisher> = publishers.iter().map(|p| (p.id, p)).collect();

    for publisher in &publishers {
        match publisher.category {
            Category::Individual => grouped.individuals.push(AvailableSolo {
                publisher: publisher.clone(),
                note: None,
            }),
            Category::Minor => grouped.minors.push(publisher.clone()),
            Category::Paired => {
                let partner = publisher
                    .pair_id
                    .and_then(|id| by_id.get(&id))
                    .filter(|p| publisher.is_paired_with(p));

                match partner {
                    // Emit each couple once, from its lower-id member
                    Some(partner) if publisher.id < partner.id => {
                        grouped.couples.push(AvailableCouple {
                            id: format!("couple_{}_{}", publisher.id, partner.id),
                            member1: publisher.clone(),
                            member2: (*partner).clone(),
                            slots: 2,
                        })
                    }
                    Some(_) => {}
                    None => grouped.individuals.push(AvailableSolo {
                        publisher: publisher.clone(),
                        note: Some(PARTNER_UNAVAILABLE_NOTE.to_string()),
                    }),
                }
            }
        }
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher(name: &str, category: Category) -> Publisher {
        Publisher {
            id: Uuid::new_v4(),
            name: name.to_string(),
            category,
            pair_id: None,
            guardian_id: None,
            active: true,
        }
    }

    #[test]
    fn test_groups_by_category() {
        let mut x = publisher("X", Category::Paired);
        let mut y = publisher("Y", Category::Paired);
        x.pair_id = Some(y.id);
        y.pair_id = Some(x.id);
        let solo = publisher("S", Category::Individual);
        let kid = publisher("K", Category::Minor);

        let grouped = group_available(vec![x, y, solo, kid]);

        assert_eq!(grouped.couples.len(), 1);
        assert_eq!(grouped.couples[0].slots, 2);
        assert_eq!(grouped.individuals.len(), 1);
        assert_eq!(grouped.minors.len(), 1);
    }

    #[test]
    fn test_lonely_partner_listed_as_solo_with_note() {
        let mut x = publisher("X", Category::Paired);
        x.pair_id = Some(Uuid::new_v4());

        let grouped = group_available(vec![x]);

        assert!(grouped.couples.is_empty());
        assert_eq!(grouped.individuals.len(), 1);
        assert!(grouped.individuals[0].note.is_some());
    }

    #[test]
    fn test_serializes_with_legacy_keys() {
        let json = serde_json::to_value(GroupedAvailability::default()).unwrap();
        assert!(json["solos"].is_array());
        assert!(json["matrimonios"].is_array());
        assert!(json["menores"].is_array());
    }
}
