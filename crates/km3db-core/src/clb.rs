// CLB hardware map
//
// Read-through view over the `clbmap` stream: every CLB (central logic
// board) of one detector, indexed lazily by UPI, DOM ID, omkey and base
// module per DU. Indices are built on first use and kept for the
// lifetime of the map; a fresh view means loading a new map.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use serde::Deserialize;
use tracing::warn;

use crate::error::CoreError;
use crate::streams::StreamDs;

/// One CLB entry of the `clbmap` stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Clb {
    #[serde(rename = "DETOID")]
    pub det_oid: String,
    #[serde(rename = "DU")]
    pub du: u32,
    #[serde(rename = "FLOOR")]
    pub floor: u32,
    #[serde(rename = "SERIALNUMBER")]
    pub serial_number: u32,
    #[serde(rename = "UPI")]
    pub upi: String,
    #[serde(rename = "DOMID")]
    pub dom_id: u32,
}

/// All CLBs of one detector, with lazily built lookup indices.
pub struct ClbMap {
    det_oid: String,
    clbs: Vec<Clb>,
    by_upi: OnceLock<HashMap<String, usize>>,
    by_dom_id: OnceLock<HashMap<u32, usize>>,
    by_omkey: OnceLock<HashMap<(u32, u32), usize>>,
    base_by_du: OnceLock<HashMap<u32, usize>>,
}

impl ClbMap {
    /// Fetch the full `clbmap` record set of a detector.
    pub async fn load(sds: &StreamDs, det_oid: &str) -> Result<Self, CoreError> {
        let clbs = sds
            .stream("clbmap")?
            .get_typed::<Clb>(&[("detoid", det_oid)])
            .await?
            .ok_or_else(|| CoreError::KeyNotFound {
                index: "clbmap",
                key: det_oid.to_owned(),
            })?;
        Ok(Self::from_clbs(det_oid, clbs))
    }

    /// Build a map from already decoded records.
    pub fn from_clbs(det_oid: impl Into<String>, clbs: Vec<Clb>) -> Self {
        Self {
            det_oid: det_oid.into(),
            clbs,
            by_upi: OnceLock::new(),
            by_dom_id: OnceLock::new(),
            by_omkey: OnceLock::new(),
            base_by_du: OnceLock::new(),
        }
    }

    /// The detector this map belongs to.
    pub fn det_oid(&self) -> &str {
        &self.det_oid
    }

    pub fn len(&self) -> usize {
        self.clbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clbs.is_empty()
    }

    /// All CLBs, in server order.
    pub fn iter(&self) -> std::slice::Iter<'_, Clb> {
        self.clbs.iter()
    }

    /// The CLB with this UPI.
    pub fn upi(&self, upi: &str) -> Result<&Clb, CoreError> {
        let index = self.by_upi.get_or_init(|| {
            self.clbs
                .iter()
                .enumerate()
                .map(|(i, clb)| (clb.upi.clone(), i))
                .collect()
        });
        self.entry(index.get(upi).copied(), "upi", upi)
    }

    /// The CLB with this DOM ID.
    pub fn dom_id(&self, dom_id: u32) -> Result<&Clb, CoreError> {
        let index = self.by_dom_id.get_or_init(|| {
            self.clbs
                .iter()
                .enumerate()
                .map(|(i, clb)| (clb.dom_id, i))
                .collect()
        });
        self.entry(index.get(&dom_id).copied(), "dom_id", &dom_id.to_string())
    }

    /// The CLB at `(du, floor)`.
    pub fn omkey(&self, du: u32, floor: u32) -> Result<&Clb, CoreError> {
        let index = self.by_omkey.get_or_init(|| {
            self.clbs
                .iter()
                .enumerate()
                .map(|(i, clb)| ((clb.du, clb.floor), i))
                .collect()
        });
        self.entry(
            index.get(&(du, floor)).copied(),
            "omkey",
            &format!("({du}, {floor})"),
        )
    }

    /// The base (floor 0) CLB of a DU.
    pub fn base(&self, du: u32) -> Result<&Clb, CoreError> {
        let index = self.base_by_du.get_or_init(|| {
            self.clbs
                .iter()
                .enumerate()
                .filter(|(_, clb)| clb.floor == 0)
                .map(|(i, clb)| (clb.du, i))
                .collect()
        });
        self.entry(index.get(&du).copied(), "base", &du.to_string())
    }

    fn entry(&self, idx: Option<usize>, index: &'static str, key: &str) -> Result<&Clb, CoreError> {
        idx.and_then(|i| self.clbs.get(i))
            .ok_or_else(|| CoreError::KeyNotFound {
                index,
                key: key.to_owned(),
            })
    }
}

impl<'a> IntoIterator for &'a ClbMap {
    type Item = &'a Clb;
    type IntoIter = std::slice::Iter<'a, Clb>;

    fn into_iter(self) -> Self::IntoIter {
        self.clbs.iter()
    }
}

/// Row shape of the `integration` stream used by the compass join.
#[derive(Debug, Deserialize)]
struct IntegrationEntry {
    #[serde(rename = "CONTENT_UPI")]
    content_upi: String,
}

fn compass_cache() -> &'static Mutex<HashMap<String, String>> {
    static CACHE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Compass UPI for a CLB UPI.
///
/// Joins the `integration` stream for the CLB container and picks the
/// AHRS/LSM303 entry; with more than one candidate the first wins, with
/// a warning. Results are memoized for the process lifetime.
pub async fn compass_upi(sds: &StreamDs, clb_upi: &str) -> Result<String, CoreError> {
    if let Some(hit) = compass_cache()
        .lock()
        .expect("compass cache poisoned")
        .get(clb_upi)
    {
        return Ok(hit.clone());
    }

    let entries = sds
        .stream("integration")?
        .get_typed::<IntegrationEntry>(&[("container_upi", clb_upi)])
        .await?
        .unwrap_or_default();

    let mut candidates = entries
        .into_iter()
        .map(|entry| entry.content_upi)
        .filter(|upi| upi.contains("AHRS") || upi.contains("LSM303"));

    let Some(compass) = candidates.next() else {
        return Err(CoreError::NoCompassUpi(clb_upi.to_owned()));
    };
    if candidates.next().is_some() {
        warn!("multiple compass UPIs found for CLB UPI {clb_upi}, using the first entry");
    }

    compass_cache()
        .lock()
        .expect("compass cache poisoned")
        .insert(clb_upi.to_owned(), compass.clone());

    Ok(compass)
}
