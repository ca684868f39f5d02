#![allow(dead_code)]

pub const USERNAME: &str = "gardener";
pub const API_KEY: &str = "f00dcafe";

pub const ALL_DEVICES: &str = r#"
{
    "result": "ok",
    "devices": [
        {
            "name": "Backyard",
            "gatewayId": "3F7A23FE004B1200",
            "status": "Connected",
            "taplinker": [
                {
                    "taplinkerName": "Lawn",
                    "taplinkerId": "6D5C1AB2004B1200",
                    "status": "Connected",
                    "batteryStatus": "95%",
                    "signal": 86,
                    "watering": {"remaining": 12, "total": 20}
                },
                {
                    "taplinkerName": "Beds",
                    "taplinkerId": "1E2D3C4B004B1200",
                    "status": "Disconnected",
                    "batteryStatus": "40%",
                    "signal": "20%",
                    "watering": null
                }
            ]
        },
        {
            "name": "Greenhouse",
            "gatewayId": "A0B1C2D3004B1200",
            "status": "Disconnected",
            "taplinker": []
        }
    ]
}
"#;

pub const RATE_LIMITED: &str =
    r#"{"result":"error","message":"The minimum interval of calling this API is 5 minutes."}"#;

/// `getAllDevices` response with `gateways` gateways of `taplinkers` tap-linkers each
pub fn many_devices(gateways: usize, taplinkers: usize) -> String {
    let devices: Vec<serde_json::Value> = (0..gateways)
        .map(|g| {
            let taplinker: Vec<serde_json::Value> = (0..taplinkers)
                .map(|t| {
                    serde_json::json!({
                        "taplinkerName": format!("Tap {g}.{t}"),
                        "taplinkerId": format!("B{g:03X}{t:04X}004B1200"),
                        "status": "Connected",
                        "batteryStatus": "90%",
                        "signal": 75,
                        "watering": null
                    })
                })
                .collect();
            serde_json::json!({
                "name": format!("Gateway {g}"),
                "gatewayId": format!("A{g:07X}004B1200"),
                "status": "Connected",
                "taplinker": taplinker
            })
        })
        .collect();
    serde_json::json!({"result": "ok", "devices": devices}).to_string()
}
