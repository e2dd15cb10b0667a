//! Greedy proximity clustering.
//!
//! Single pass in input order: each landmark not yet claimed seeds a group
//! and claims every later unclaimed landmark within the radius of the seed.
//! Groups of one stay plain landmarks. Clusters are rebuilt from scratch on
//! every update, so the same input always yields the same membership.
//! Each cluster is placed at the screen projection of its centroid.

use crate::geo::GeoPoint;
use crate::landmark::{LandmarkCluster, ScreenProjection, VisibleItem, VisibleLandmark};

/// Group visible landmarks that lie within `radius_meters` of a seed.
///
/// `project` maps a cluster centroid to the screen. Output order follows
/// the seeds' input order.
pub fn cluster_landmarks<F>(landmarks: Vec<VisibleLandmark>, radius_meters: f64, project: F) -> Vec<VisibleItem>
where
    F: Fn(&GeoPoint) -> Option<ScreenProjection>,
{
    let mut claimed = vec![false; landmarks.len()];
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for seed in 0..landmarks.len() {
        if claimed[seed] {
            continue;
        }
        claimed[seed] = true;

        let mut group = vec![seed];
        let seed_location = landmarks[seed].landmark.location;
        for other in (seed + 1)..landmarks.len() {
            if claimed[other] {
                continue;
            }
            let distance = seed_location.distance_to(&landmarks[other].landmark.location);
            if distance <= radius_meters {
                claimed[other] = true;
                group.push(other);
            }
        }
        groups.push(group);
    }

    let mut slots: Vec<Option<VisibleLandmark>> = landmarks.into_iter().map(Some).collect();
    let mut items = Vec::with_capacity(groups.len());

    for group in groups {
        let members: Vec<VisibleLandmark> = group
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect();

        if members.len() == 1 {
            items.extend(members.into_iter().map(VisibleItem::Single));
        } else if let Some(cluster) = LandmarkCluster::from_members(members, &project) {
            items.push(VisibleItem::Cluster(cluster));
        }
    }

    items
}
