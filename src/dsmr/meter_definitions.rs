use std::collections::HashMap;

/* Object identifiers copied into the top level Frame fields */
pub const VERSION_ID: &str = "1-3:0.2.8";
pub const TIMESTAMP_ID: &str = "0-0:1.0.0";
pub const EQUIPMENT_ID: &str = "0-0:96.1.1";

/* Values that look numeric at times but are identifiers or free text */
pub const TEXT_IDS: [&str; 4] = [VERSION_ID, EQUIPMENT_ID, "0-1:96.1.0", "0-0:96.13.0"];

pub fn get_dsmr_obis_mapping() -> HashMap<&'static str, &'static str> {
    let mut map = HashMap::new();

    // Energy registers per tariff
    map.insert("1-0:1.8.1", "energy_delivered_low");
    map.insert("1-0:1.8.2", "energy_delivered_normal");
    map.insert("1-0:2.8.1", "energy_received_low");
    map.insert("1-0:2.8.2", "energy_received_normal");
    map.insert("0-0:96.14.0", "tariff_indicator");

    // Instantaneous power
    map.insert("1-0:1.7.0", "power_delivered");
    map.insert("1-0:2.7.0", "power_received");
    map.insert("1-0:21.7.0", "power_delivered_l1");
    map.insert("1-0:41.7.0", "power_delivered_l2");
    map.insert("1-0:61.7.0", "power_delivered_l3");
    map.insert("1-0:22.7.0", "power_received_l1");
    map.insert("1-0:42.7.0", "power_received_l2");
    map.insert("1-0:62.7.0", "power_received_l3");

    // Voltage and current
    map.insert("1-0:32.7.0", "voltage_l1");
    map.insert("1-0:52.7.0", "voltage_l2");
    map.insert("1-0:72.7.0", "voltage_l3");
    map.insert("1-0:31.7.0", "current_l1");
    map.insert("1-0:51.7.0", "current_l2");
    map.insert("1-0:71.7.0", "current_l3");

    // Gas
    map.insert("0-1:24.2.1", "gas_delivered");
    map.insert("0-1:96.1.0", "gas_equipment_id");

    // Identification
    map.insert(VERSION_ID, "version");
    map.insert(TIMESTAMP_ID, "timestamp");
    map.insert(EQUIPMENT_ID, "equipment_id");

    map
}

pub fn get_obis_description(obis_code: &str) -> Option<&'static str> {
    let description = match obis_code {
        "1-3:0.2.8" => "Version information for P1 output",
        "0-0:1.0.0" => "Date-time stamp of the P1 message",
        "0-0:96.1.1" => "Equipment identifier",
        "1-0:1.8.1" => "Meter reading electricity delivered to client (tariff 1)",
        "1-0:1.8.2" => "Meter reading electricity delivered to client (tariff 2)",
        "1-0:2.8.1" => "Meter reading electricity delivered by client (tariff 1)",
        "1-0:2.8.2" => "Meter reading electricity delivered by client (tariff 2)",
        "0-0:96.14.0" => "Tariff indicator electricity",
        "1-0:1.7.0" => "Actual electricity power delivered (+P)",
        "1-0:2.7.0" => "Actual electricity power received (-P)",
        "1-0:21.7.0" => "Instantaneous active power L1 (+P)",
        "1-0:41.7.0" => "Instantaneous active power L2 (+P)",
        "1-0:61.7.0" => "Instantaneous active power L3 (+P)",
        "1-0:22.7.0" => "Instantaneous active power L1 (-P)",
        "1-0:42.7.0" => "Instantaneous active power L2 (-P)",
        "1-0:62.7.0" => "Instantaneous active power L3 (-P)",
        "1-0:32.7.0" => "Instantaneous voltage L1",
        "1-0:52.7.0" => "Instantaneous voltage L2",
        "1-0:72.7.0" => "Instantaneous voltage L3",
        "1-0:31.7.0" => "Instantaneous current L1",
        "1-0:51.7.0" => "Instantaneous current L2",
        "1-0:71.7.0" => "Instantaneous current L3",
        "0-1:24.2.1" => "Last 5-minute value gas delivered to client",
        "0-1:96.1.0" => "Gas meter equipment identifier",
        _ => return None,
    };
    Some(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_contains_well_known_ids() {
        let map = get_dsmr_obis_mapping();
        assert_eq!(map.get(VERSION_ID), Some(&"version"));
        assert_eq!(map.get(EQUIPMENT_ID), Some(&"equipment_id"));
        assert_eq!(map.get("0-1:24.2.1"), Some(&"gas_delivered"));
        assert_eq!(map.get("1-0:52.7.0"), Some(&"voltage_l2"));
    }

    #[test]
    fn test_every_mapped_id_is_described() {
        for id in get_dsmr_obis_mapping().keys() {
            assert!(get_obis_description(id).is_some(), "{id}");
        }
        assert_eq!(get_obis_description("nonexistent"), None);
    }
}
