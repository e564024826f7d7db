//! Pre-defined city scenarios for headless runs and testing.

use jetcity_core::{AgentSpec, CityConfig, FlightRules, TerrainMap};

const LAND_GREY: [u8; 3] = [126, 126, 126];
const WATER_BLUE: [u8; 3] = [36, 88, 178];

const MODELS: [&str; 4] = ["Skimmer Mk2", "Volantor S", "Aero Courier", "Pelican LX"];
const OWNERS: [&str; 3] = ["city works", "skyline couriers", "harbor patrol"];

/// Roster of `count` vehicles with unique JET-nnn callsigns.
pub fn standard_roster(count: usize) -> Vec<AgentSpec> {
    (0..count)
        .map(|i| {
            AgentSpec::new(
                format!("JET-{:03}", i + 1),
                i as u32 + 1,
                MODELS[i % MODELS.len()],
                OWNERS[i % OWNERS.len()],
            )
        })
        .collect()
}

/// Featureless all-land square map.
pub fn open_plain(size: u32) -> TerrainMap {
    TerrainMap::uniform(size.max(1), size.max(1), LAND_GREY).expect("non-zero dimensions")
}

/// Land mass split by a vertical river, with a harbor basin in the
/// south-east. Exercises water rejection in placement.
pub fn harbor_city_map(width: u32, height: u32) -> TerrainMap {
    let width = width.max(16);
    let height = height.max(16);
    let river_left = width * 2 / 3;
    let river_right = river_left + width / 12;
    let basin_x = width * 3 / 4;
    let basin_y = height * 3 / 4;
    let basin_r = (width.min(height) / 6) as i64;

    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let in_river = x >= river_left && x < river_right;
            let dx = x as i64 - basin_x as i64;
            let dy = y as i64 - basin_y as i64;
            let in_basin = dx * dx + dy * dy < basin_r * basin_r;
            let rgb = if in_river || in_basin {
                WATER_BLUE
            } else {
                LAND_GREY
            };
            data.extend_from_slice(&rgb);
        }
    }
    TerrainMap::from_rgb8(width, height, &data).expect("buffer sized to dimensions")
}

/// Busy all-land city: many agents, few pads.
pub fn commuter_rush(agents: usize, slots: u32, seed: u64) -> CityConfig {
    CityConfig {
        map: open_plain(400),
        parking_slot_count: slots,
        roster: standard_roster(agents),
        rules: FlightRules::default(),
        seed,
        spawn_parked: (agents / 4).min(slots as usize),
    }
}

/// River-and-basin city; destinations and pads must avoid the water.
pub fn harbor_run(agents: usize, slots: u32, seed: u64) -> CityConfig {
    CityConfig {
        map: harbor_city_map(480, 360),
        parking_slot_count: slots,
        roster: standard_roster(agents),
        rules: FlightRules::default(),
        seed,
        spawn_parked: 0,
    }
}
