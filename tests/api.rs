use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use framemog::scoring::generate_fallback_dominance;
use framemog::server::{router, AppState};
use framemog::PipelineConfig;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    router(AppState::new(PipelineConfig::default()))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = body.map_or_else(Body::empty, |v| Body::from(v.to_string()));
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .expect("request");
    let res = app.clone().oneshot(req).await.expect("response");
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    call(app, Method::POST, uri, Some(body)).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    call(app, Method::GET, uri, None).await
}

async fn create(app: &Router) -> String {
    let (status, body) = call(app, Method::POST, "/analysis", None).await;
    assert_eq!(StatusCode::CREATED, status);
    body["analysisId"].as_str().expect("analysis id").to_string()
}

fn three_faces() -> Value {
    json!({
        "faces": [
            { "left_to_right_index": 0, "box": { "x": 0.7, "y": 0.2, "w": 0.2, "h": 0.3 } },
            { "left_to_right_index": 1, "box": { "x": 0.1, "y": 0.2, "w": 0.2, "h": 0.3 } },
            { "left_to_right_index": 2, "box": { "x": 0.4, "y": 0.2, "w": 0.2, "h": 0.3 } }
        ]
    })
}

async fn detected(app: &Router) -> String {
    let id = create(app).await;
    let (status, _) = post(app, &format!("/analysis/{id}/detect"), json!({ "faces": three_faces() })).await;
    assert_eq!(StatusCode::OK, status);
    id
}

fn labels_and_x(people: &Value) -> Vec<(String, f64)> {
    people
        .as_array()
        .expect("people")
        .iter()
        .map(|p| {
            (
                p["label"].as_str().unwrap_or_default().to_string(),
                p["box"]["x"].as_f64().unwrap_or(-1.0),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_health_and_config() {
    let app = app();
    let (status, body) = get(&app, "/health").await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(json!("ok"), body["status"]);

    let (status, body) = get(&app, "/config").await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(json!(0.65), body["dedupeThreshold"]);
    assert_eq!(json!(256), body["thumbnail"]["size"]);
}

#[tokio::test]
async fn test_full_flow() {
    let app = app();
    let id = create(&app).await;

    let fenced = format!("```json\n{}\n```", three_faces());
    let (status, body) = post(&app, &format!("/analysis/{id}/detect"), json!({ "raw": fenced })).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(
        vec![
            ("Person A".to_string(), 0.1),
            ("Person B".to_string(), 0.4),
            ("Person C".to_string(), 0.7)
        ],
        labels_and_x(&body["people"])
    );
    assert_eq!(json!("face-0"), body["people"][0]["id"]);

    // Labels are fixed once assigned.
    let other = json!({ "faces": [{ "left_to_right_index": 0, "box": { "x": 0.5, "y": 0.5, "w": 0.1, "h": 0.1 } }] });
    let (status, again) = post(&app, &format!("/analysis/{id}/detect"), json!({ "faces": other })).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(body["people"], again["people"]);

    let (status, body) = post(&app, &format!("/analysis/{id}/select"), json!({ "label": " Person B " })).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(json!("Person B"), body["selectedLabel"]);
    assert_eq!(json!("selecting"), body["status"]);
    assert_eq!(Value::Null, body["calibration"]);

    let output = json!({
        "people": [
            { "label": "Person A", "dominance_score": 60 },
            { "label": "Person B", "dominance_score": 80.4 },
            { "label": "Person C", "dominance_score": 70 }
        ]
    });
    let (status, body) = post(&app, &format!("/analysis/{id}/dominance"), json!({ "output": output })).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(json!("model"), body["dominance"]["source"]);
    assert_eq!(json!("Person B"), body["dominance"]["result"]["user_label"]);
    assert_eq!(json!(1), body["dominance"]["result"]["user_rank"]);
    assert_eq!(
        json!([
            { "rank": 1, "label": "Person B", "dominance_score": 80, "is_you": true },
            { "rank": 2, "label": "Person C", "dominance_score": 70, "is_you": false },
            { "rank": 3, "label": "Person A", "dominance_score": 60, "is_you": false }
        ]),
        body["leaderboard"]
    );

    let scores = json!({
        "photo_type": "frat_group",
        "overall_score": 20,
        "potential_score": 99,
        "score_breakdown": {
            "frame": 70, "posture": 70, "presence": 70,
            "composition": 70, "expression": 70, "style": 70
        },
        "insights": ["Own the center.", "Stack the spine.", "Relax the jaw."],
        "top_1_move": "Step into the middle."
    });
    let raw = format!("Here you go:\n```json\n{scores}\n```");
    let (status, body) = post(&app, &format!("/analysis/{id}/frame-mog"), json!({ "raw": raw })).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(json!("complete"), body["status"]);
    assert_eq!(json!("model"), body["frameMog"]["source"]);
    assert_eq!(json!(70), body["frameMog"]["result"]["overall_score"]);
    assert_eq!(json!(99), body["frameMog"]["result"]["potential_score"]);
    assert_eq!(json!("Space Claim"), body["metricLabels"]["frame"]);

    let (status, stored) = get(&app, &format!("/analysis/{id}")).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(body, stored);
}

#[tokio::test]
async fn test_detect_dedupes_with_request_threshold() {
    let app = app();
    let id = create(&app).await;
    let faces = json!({
        "faces": [
            { "left_to_right_index": 0, "box": { "x": 0.10, "y": 0.10, "w": 0.20, "h": 0.20 } },
            { "left_to_right_index": 1, "box": { "x": 0.12, "y": 0.11, "w": 0.22, "h": 0.22 } }
        ]
    });
    let body = json!({ "faces": faces, "threshold": 0.6 });
    let (status, body) = post(&app, &format!("/analysis/{id}/detect"), body).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(vec![("Person A".to_string(), 0.12)], labels_and_x(&body["people"]));
}

#[tokio::test]
async fn test_detect_rejects_bad_input() {
    let app = app();
    let id = create(&app).await;
    let uri = format!("/analysis/{id}/detect");

    let (status, body) = post(&app, &uri, json!({ "faces": { "faces": [] } })).await;
    assert_eq!(StatusCode::BAD_REQUEST, status);
    assert_eq!(json!("no faces detected"), body["error"]);

    let (status, stored) = get(&app, &format!("/analysis/{id}")).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(json!("failed"), stored["status"]);
    assert_eq!(json!("no faces detected"), stored["errorMessage"]);

    let (status, _) = post(&app, &uri, json!({ "raw": "I could not find anyone." })).await;
    assert_eq!(StatusCode::BAD_REQUEST, status);

    let (status, _) = post(&app, &uri, json!({ "faces": three_faces(), "threshold": 1.5 })).await;
    assert_eq!(StatusCode::BAD_REQUEST, status);

    // A later successful detect recovers the analysis.
    let (status, _) = post(&app, &uri, json!({ "faces": three_faces() })).await;
    assert_eq!(StatusCode::OK, status);
    let (_, stored) = get(&app, &format!("/analysis/{id}")).await;
    assert_eq!(json!("selecting"), stored["status"]);
    assert_eq!(None, stored.get("errorMessage"));
}

#[tokio::test]
async fn test_dominance_fallback_is_deterministic() {
    let app = app();
    let id = detected(&app).await;
    let uri = format!("/analysis/{id}/dominance");

    let (status, first) = post(&app, &uri, json!({ "raw": "the model refused" })).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(json!("fallback"), first["dominance"]["source"]);
    assert_eq!(json!({ "kind": "unparseable_output" }), first["dominance"]["fallbackReason"]);

    let want = generate_fallback_dominance(&id, &["Person A", "Person B", "Person C"]);
    assert_eq!(
        serde_json::to_value(&want.people).unwrap_or_default(),
        first["dominance"]["result"]["people"]
    );

    let (_, second) = post(&app, &uri, json!({ "raw": "the model refused" })).await;
    assert_eq!(first["dominance"], second["dominance"]);
}

#[tokio::test]
async fn test_dominance_label_mismatch_falls_back() {
    let app = app();
    let id = detected(&app).await;
    let output = json!({
        "people": [
            { "label": "Person A", "dominance_score": 60 },
            { "label": "Person Z", "dominance_score": 80 }
        ]
    });
    let (status, body) = post(&app, &format!("/analysis/{id}/dominance"), json!({ "output": output })).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(json!("fallback"), body["dominance"]["source"]);
    assert_eq!(json!({ "kind": "label_mismatch" }), body["dominance"]["fallbackReason"]);
    assert_eq!(json!(3), body["dominance"]["result"]["total_people"]);
}

#[tokio::test]
async fn test_select_after_dominance_sets_rank() {
    let app = app();
    let id = detected(&app).await;
    let output = json!({
        "people": [
            { "label": "Person A", "dominance_score": 90 },
            { "label": "Person B", "dominance_score": 50 },
            { "label": "Person C", "dominance_score": 70 }
        ]
    });
    post(&app, &format!("/analysis/{id}/dominance"), json!({ "output": output })).await;

    let (status, body) = post(&app, &format!("/analysis/{id}/select"), json!({ "label": "Person C" })).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(json!("Person C"), body["dominance"]["result"]["user_label"]);
    assert_eq!(json!(2), body["dominance"]["result"]["user_rank"]);
}

#[tokio::test]
async fn test_select_stores_calibration() {
    let app = app();
    let id = detected(&app).await;
    let uri = format!("/analysis/{id}/select");

    let answers = json!({ "height": "tall", "goal": "presence" });
    let (status, body) = post(&app, &uri, json!({ "selectedLabel": "Person A", "answers": answers.clone() })).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(json!("Person A"), body["selectedLabel"]);
    assert_eq!(json!({ "answers": answers, "version": "cal_v1" }), body["calibration"]);

    // Non-object answers leave the stored calibration alone.
    let (_, body) = post(&app, &uri, json!({ "label": "Person C", "answers": [1, 2], "version": "cal_v2" })).await;
    assert_eq!(json!("Person C"), body["selectedLabel"]);
    assert_eq!(json!("cal_v1"), body["calibration"]["version"]);

    let (_, body) = post(&app, &uri, json!({ "label": "Person B", "answers": {}, "version": "cal_v2" })).await;
    assert_eq!(json!({ "answers": {}, "version": "cal_v2" }), body["calibration"]);
}

#[tokio::test]
async fn test_frame_mog_requires_selection() {
    let app = app();
    let id = detected(&app).await;
    let uri = format!("/analysis/{id}/frame-mog");

    let (status, _) = post(&app, &uri, json!({ "raw": "{}" })).await;
    assert_eq!(StatusCode::CONFLICT, status);

    post(&app, &format!("/analysis/{id}/select"), json!({ "label": "Person A" })).await;
    let (status, body) = post(&app, &uri, json!({ "output": { "photo_type": "selfie" } })).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(json!("fallback"), body["frameMog"]["source"]);
    assert_eq!(json!(25), body["frameMog"]["result"]["overall_score"]);
    assert_eq!(json!(50), body["frameMog"]["result"]["potential_score"]);
    assert_eq!(json!("complete"), body["status"]);
}

#[tokio::test]
async fn test_not_found() {
    let app = app();
    let (status, body) = get(&app, "/analysis/missing").await;
    assert_eq!(StatusCode::NOT_FOUND, status);
    assert_eq!(json!("analysis not found: missing"), body["error"]);

    let (status, _) = post(&app, "/analysis/missing/detect", json!({ "faces": three_faces() })).await;
    assert_eq!(StatusCode::NOT_FOUND, status);

    let id = detected(&app).await;
    let (status, _) = post(&app, &format!("/analysis/{id}/select"), json!({ "label": "Person Q" })).await;
    assert_eq!(StatusCode::NOT_FOUND, status);
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 140, 200]));
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageOutputFormat::Png)
        .expect("encode png");
    buf.into_inner()
}

#[tokio::test]
async fn test_thumbnail() {
    let app = app();
    let id = detected(&app).await;
    let uri = format!("/analysis/{id}/thumbnail");

    let image = format!("data:image/png;base64,{}", STANDARD.encode(png(320, 240)));
    let (status, body) = post(&app, &uri, json!({ "label": "Person B", "image": image })).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(json!(format!("phase1/{id}/Person_B.jpg")), body["path"]);

    let jpeg = STANDARD
        .decode(body["thumbnail"].as_str().expect("thumbnail"))
        .expect("base64");
    assert_eq!(image::ImageFormat::Jpeg, image::guess_format(&jpeg).expect("format"));

    let junk = STANDARD.encode(b"definitely not an image");
    let (status, _) = post(&app, &uri, json!({ "label": "Person B", "image": junk })).await;
    assert_eq!(StatusCode::UNPROCESSABLE_ENTITY, status);

    let (status, _) = post(&app, &uri, json!({ "label": "Person B", "image": "%%%" })).await;
    assert_eq!(StatusCode::BAD_REQUEST, status);

    let (status, _) = post(&app, &uri, json!({ "label": "Person X", "image": junk })).await;
    assert_eq!(StatusCode::NOT_FOUND, status);
}
