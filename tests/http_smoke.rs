//! Drives a real `may_minihttp` listener over TCP.

use quartermaster::config::ImportConfig;
use quartermaster::http::{serve, AppContext};
use quartermaster::model::{Location, PropertyType, Role, User};
use quartermaster::{MemoryStore, Store};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::time::Duration;

struct Server {
    base: String,
    admin: User,
    warehouse: Location,
    kind: PropertyType,
}

fn start() -> Server {
    let store = MemoryStore::new();
    let warehouse = Location::new("Warehouse");
    let kind = PropertyType::new("Computers");
    store.insert_location(&warehouse).unwrap();
    store.insert_property_type(&kind).unwrap();
    let admin = User::new("admin", "Admin", Role::Admin).at_location(warehouse.id);
    store.insert_user(&admin).unwrap();

    let port = TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("Failed to find a free port")
        .port();
    let addr = format!("127.0.0.1:{port}");
    // the listener runs until the test process exits
    let _handle = serve(AppContext::new(store, ImportConfig::default()), &addr)
        .expect("Failed to start server");

    let base = format!("http://{addr}");
    for _ in 0..50 {
        if ureq::get(&format!("{base}/health")).call().is_ok() {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    Server {
        base,
        admin,
        warehouse,
        kind,
    }
}

fn post(server: &Server, path: &str, body: Value) -> Value {
    let text = ureq::post(&format!("{}{path}", server.base))
        .set("X-User-Id", &server.admin.id.to_string())
        .set("Content-Type", "application/json")
        .send_string(&body.to_string())
        .expect("Request failed")
        .into_string()
        .expect("Unreadable body");
    serde_json::from_str(&text).expect("Reply is not JSON")
}

#[test]
fn test_register_and_scan_over_http() {
    let server = start();

    let health = ureq::get(&format!("{}/health", server.base))
        .call()
        .expect("Health check failed")
        .into_string()
        .unwrap();
    assert_eq!(serde_json::from_str::<Value>(&health).unwrap(), json!({"status": "ok"}));

    let created = post(
        &server,
        "/Property/Create",
        json!({
            "name": "Projector",
            "inventoryNumber": "PJ-1",
            "propertyTypeId": server.kind.id,
            "locationId": server.warehouse.id,
        }),
    );
    assert_eq!(created["qrCode"], "QM:PJ-1");

    let scanned = post(&server, "/Scan/ScanProperty", json!({"inventoryNumber": "PJ-1"}));
    assert_eq!(scanned["property"]["id"], created["id"]);
    assert_eq!(scanned["location"]["name"], "Warehouse");

    let anonymous = ureq::get(&format!("{}/Inventory", server.base)).call();
    assert!(matches!(anonymous, Err(ureq::Error::Status(401, _))));
}
