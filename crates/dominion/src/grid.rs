//! Grid coordinates and Chebyshev geometry.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::RealmId;

/// A coordinate unit of the world grid. Immutable; carries no state of its
/// own. Ordered by `(realm, x, z)` so a `BTreeMap<Cell, _>` range doubles
/// as a realm-and-x-band scan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cell {
    pub realm: RealmId,
    pub x: i32,
    pub z: i32,
}

impl Cell {
    pub fn new(realm: impl Into<String>, x: i32, z: i32) -> Self {
        Self {
            realm: realm.into(),
            x,
            z,
        }
    }

    /// Chebyshev distance to another cell. `None` across realms.
    pub fn chebyshev_distance(&self, other: &Cell) -> Option<u64> {
        if self.realm != other.realm {
            return None;
        }
        let dx = (i64::from(self.x) - i64::from(other.x)).unsigned_abs();
        let dz = (i64::from(self.z) - i64::from(other.z)).unsigned_abs();
        Some(dx.max(dz))
    }

    /// Exactly one ring out, same realm.
    pub fn is_adjacent(&self, other: &Cell) -> bool {
        self.chebyshev_distance(other) == Some(1)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.realm, self.x, self.z)
    }
}

impl From<Cell> for String {
    fn from(value: Cell) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Cell {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let mut parts = value.rsplitn(3, ':');
        let z = parts.next().ok_or_else(|| bad_cell_key(&value))?;
        let x = parts.next().ok_or_else(|| bad_cell_key(&value))?;
        let realm = parts.next().ok_or_else(|| bad_cell_key(&value))?;
        if realm.is_empty() {
            return Err(bad_cell_key(&value));
        }
        let x: i32 = x.parse().map_err(|_| bad_cell_key(&value))?;
        let z: i32 = z.parse().map_err(|_| bad_cell_key(&value))?;
        Ok(Cell::new(realm, x, z))
    }
}

fn bad_cell_key(value: &str) -> String {
    format!("invalid cell key: {value}")
}

/// All cells within Chebyshev `radius` of `center` (the center included),
/// sorted by ascending distance with `(x, z)` as the tie-break.
pub fn cells_within_radius(center: &Cell, radius: u32) -> Vec<Cell> {
    let radius = i64::from(radius);
    let mut cells = Vec::new();
    for dx in -radius..=radius {
        for dz in -radius..=radius {
            let x = i64::from(center.x) + dx;
            let z = i64::from(center.z) + dz;
            if x < i64::from(i32::MIN)
                || x > i64::from(i32::MAX)
                || z < i64::from(i32::MIN)
                || z > i64::from(i32::MAX)
            {
                continue;
            }
            cells.push(Cell::new(center.realm.clone(), x as i32, z as i32));
        }
    }
    cells.sort_by_key(|cell| {
        let distance = center.chebyshev_distance(cell).unwrap_or(u64::MAX);
        (distance, cell.x, cell.z)
    });
    cells
}
