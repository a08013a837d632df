//! Soil state and cross-plant uptake arbitration
//!
//! Plants send per-zone, per-layer uptake requests; the soil arbitrator
//! shares each layer between competing plants and removes what it grants.

use serde::{Deserialize, Serialize};

/// One soil layer's plant-available resources
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilLayer {
    /// Layer thickness (mm)
    pub thickness: f64,
    /// Nitrate N (kg/ha)
    pub no3n: f64,
    /// Ammonium N (kg/ha)
    pub nh4n: f64,
    /// Extractable water (mm)
    pub water: f64,
}

/// A spatial zone of soil with its own layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilZone {
    pub name: String,
    /// Zone area (ha)
    pub area: f64,
    pub layers: Vec<SoilLayer>,
}

impl SoilZone {
    pub fn new(name: impl Into<String>, area: f64, layers: Vec<SoilLayer>) -> Self {
        Self {
            name: name.into(),
            area,
            layers,
        }
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Total mineral N in the zone (kg/ha)
    pub fn mineral_n(&self) -> f64 {
        self.layers.iter().map(|l| l.no3n + l.nh4n).sum()
    }

    pub fn water(&self) -> f64 {
        self.layers.iter().map(|l| l.water).sum()
    }
}

/// Per-layer nitrate and ammonium amounts (kg/ha)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayeredNitrogen {
    pub no3n: Vec<f64>,
    pub nh4n: Vec<f64>,
}

impl LayeredNitrogen {
    pub fn zeros(layers: usize) -> Self {
        Self {
            no3n: vec![0.0; layers],
            nh4n: vec![0.0; layers],
        }
    }

    pub fn total(&self) -> f64 {
        self.no3n.iter().sum::<f64>() + self.nh4n.iter().sum::<f64>()
    }
}

/// Uptake request or grant for one zone
///
/// N amounts are kg/ha, water is mm. A request for one resource leaves the
/// other resource's arrays empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneUptake {
    pub zone: String,
    /// Zone area (ha)
    pub area: f64,
    pub nitrogen: LayeredNitrogen,
    pub water: Vec<f64>,
}

impl ZoneUptake {
    pub fn for_zone(zone: &SoilZone) -> Self {
        Self {
            zone: zone.name.clone(),
            area: zone.area,
            nitrogen: LayeredNitrogen::default(),
            water: Vec::new(),
        }
    }

    /// Total N over the zone (kg)
    pub fn nitrogen_mass(&self) -> f64 {
        self.nitrogen.total() * self.area
    }

    /// Total water over the zone (mm·ha)
    pub fn water_volume(&self) -> f64 {
        self.water.iter().sum::<f64>() * self.area
    }

    pub fn scale(&mut self, ratio: f64) {
        for v in self
            .nitrogen
            .no3n
            .iter_mut()
            .chain(self.nitrogen.nh4n.iter_mut())
            .chain(self.water.iter_mut())
        {
            *v *= ratio;
        }
    }
}

/// Shares soil resources between plants
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoilArbitrator {
    pub zones: Vec<SoilZone>,
}

impl SoilArbitrator {
    pub fn new(zones: Vec<SoilZone>) -> Self {
        Self { zones }
    }

    /// Grant nitrogen requests, one list of zone requests per plant
    ///
    /// Where the plants together ask for more than a layer holds, each gets
    /// the same fraction of its request. Granted N is removed from the soil.
    pub fn allocate_nitrogen(&mut self, requests: &[Vec<ZoneUptake>]) -> Vec<Vec<ZoneUptake>> {
        let mut grants: Vec<Vec<ZoneUptake>> = requests.to_vec();

        for zone in &mut self.zones {
            for (layer_idx, layer) in zone.layers.iter_mut().enumerate() {
                let no3_requested =
                    layer_total(requests, &zone.name, layer_idx, |z| &z.nitrogen.no3n);
                let nh4_requested =
                    layer_total(requests, &zone.name, layer_idx, |z| &z.nitrogen.nh4n);
                let no3_fraction = grant_fraction(no3_requested, layer.no3n);
                let nh4_fraction = grant_fraction(nh4_requested, layer.nh4n);

                let mut no3_granted = 0.0;
                let mut nh4_granted = 0.0;
                for grant in grants.iter_mut().flatten().filter(|g| g.zone == zone.name) {
                    if let Some(v) = grant.nitrogen.no3n.get_mut(layer_idx) {
                        *v *= no3_fraction;
                        no3_granted += *v;
                    }
                    if let Some(v) = grant.nitrogen.nh4n.get_mut(layer_idx) {
                        *v *= nh4_fraction;
                        nh4_granted += *v;
                    }
                }
                layer.no3n = (layer.no3n - no3_granted).max(0.0);
                layer.nh4n = (layer.nh4n - nh4_granted).max(0.0);
            }
        }

        grants
    }

    /// Grant water requests, sharing each layer the same way as nitrogen
    pub fn allocate_water(&mut self, requests: &[Vec<ZoneUptake>]) -> Vec<Vec<ZoneUptake>> {
        let mut grants: Vec<Vec<ZoneUptake>> = requests.to_vec();

        for zone in &mut self.zones {
            for (layer_idx, layer) in zone.layers.iter_mut().enumerate() {
                let requested = layer_total(requests, &zone.name, layer_idx, |z| &z.water);
                let fraction = grant_fraction(requested, layer.water);

                let mut granted = 0.0;
                for grant in grants.iter_mut().flatten().filter(|g| g.zone == zone.name) {
                    if let Some(v) = grant.water.get_mut(layer_idx) {
                        *v *= fraction;
                        granted += *v;
                    }
                }
                layer.water = (layer.water - granted).max(0.0);
            }
        }

        grants
    }
}

fn layer_total(
    requests: &[Vec<ZoneUptake>],
    zone: &str,
    layer_idx: usize,
    values: impl Fn(&ZoneUptake) -> &Vec<f64>,
) -> f64 {
    requests
        .iter()
        .flatten()
        .filter(|r| r.zone == zone)
        .filter_map(|r| values(r).get(layer_idx))
        .sum()
}

fn grant_fraction(requested: f64, available: f64) -> f64 {
    if requested <= available || requested <= 0.0 {
        1.0
    } else {
        (available / requested).max(0.0)
    }
}
