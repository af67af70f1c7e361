#![allow(dead_code)]

use airzone_cloud::AirzoneClient;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const EMAIL: &str = "me@example.com";
pub const PASSWORD: &str = "secret";

pub fn client(server: &MockServer) -> AirzoneClient {
    AirzoneClient::builder(EMAIL, PASSWORD)
        .url_api(server.uri())
        .build()
        .expect("client should build")
}

pub fn login_response(token: &str) -> Value {
    json!({ "user": { "email": EMAIL, "authentication_token": token } })
}

pub fn login_mock(token: &str) -> Mock {
    Mock::given(method("POST"))
        .and(path("/users/sign_in"))
        .and(body_partial_json(json!({ "email": EMAIL, "password": PASSWORD })))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response(token)))
}

pub fn living_room() -> Value {
    json!({
        "id": "zone-1",
        "name": "Living Room",
        "system_id": "sys-1",
        "device_id": "dev-1",
        "system_number": "1",
        "zone_number": "1",
        "state": "1",
        "consign": "22.0",
        "temp": "21.5",
        "humidity": "45"
    })
}

pub fn bedroom() -> Value {
    json!({
        "id": "zone-2",
        "name": "Bedroom",
        "system_id": "sys-1",
        "device_id": "dev-1",
        "system_number": "1",
        "zone_number": "2",
        "state": "0",
        "consign": "19.5",
        "temp": "20.0",
        "humidity": "50"
    })
}

pub fn system_record(mode: &str) -> Value {
    json!({
        "id": "sys-1",
        "name": "Home",
        "device_id": "dev-1",
        "system_number": "1",
        "mode": mode,
        "min_limit": "15.0",
        "max_limit": "30.0"
    })
}

/// Device relations, systems and zones for one account, all requiring `token`.
pub async fn mount_installation(server: &MockServer, token: &str, zones: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/device_relations"))
        .and(query_param("user_token", token))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_relations": [{ "id": 1, "device": { "id": "dev-1", "name": "Webserver" } }]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/systems"))
        .and(query_param("device_id", "dev-1"))
        .and(query_param("user_token", token))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "systems": [system_record("5")] })),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/zones"))
        .and(query_param("system_id", "sys-1"))
        .and(query_param("user_token", token))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "zones": zones })))
        .mount(server)
        .await;
}

pub async fn mount_unauthorized(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(query_param("user_token", token))
        .respond_with(ResponseTemplate::new(401).set_body_string("{}"))
        .mount(server)
        .await;
}
