//! Patient records CRUD server with sampled request/response logging.
//!
//! Run with:
//!   RUST_LOG=info SAMPLE_RATE=0.5 cargo run --example patients
//!
//! Try:
//!   curl http://localhost:8080/patients
//!   curl -X POST http://localhost:8080/patients \
//!        -H 'content-type: application/json' \
//!        -d '{"first_name":"Ada","last_name":"Lovelace","birth_date":"1815-12-10","gender":"Female","email":"ada@example.com","phone":"555-010-1815"}'
//!   curl http://localhost:8080/patients/1
//!   curl -X DELETE http://localhost:8080/patients/1

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use httpshape::middleware::{MetadataLogger, SampleRate, TracingLogger, instrument};
use httpshape::{Request, Response, Router, Server, StatusCode};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
struct Patient {
    #[serde(default)]
    id: u64,
    first_name: String,
    last_name: String,
    birth_date: String,
    gender: String,
    email: String,
    phone: String,
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Inner {
    patients: HashMap<u64, Patient>,
    next_id: u64,
}

#[derive(Default)]
struct PatientStore(RwLock<Inner>);

impl PatientStore {
    fn seeded(count: usize) -> Self {
        let store = Self::default();
        for _ in 0..count {
            store.create(random_patient());
        }
        store
    }

    fn create(&self, mut patient: Patient) -> Patient {
        let mut inner = self.0.write().unwrap_or_else(|e| e.into_inner());
        inner.next_id += 1;
        patient.id = inner.next_id;
        inner.patients.insert(patient.id, patient.clone());
        patient
    }

    fn get(&self, id: u64) -> Option<Patient> {
        self.0.read().unwrap_or_else(|e| e.into_inner()).patients.get(&id).cloned()
    }

    fn list(&self) -> Vec<Patient> {
        let inner = self.0.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<Patient> = inner.patients.values().cloned().collect();
        all.sort_by_key(|p| p.id);
        all
    }

    fn update(&self, id: u64, mut patient: Patient) -> Option<Patient> {
        let mut inner = self.0.write().unwrap_or_else(|e| e.into_inner());
        let slot = inner.patients.get_mut(&id)?;
        patient.id = id;
        *slot = patient.clone();
        Some(patient)
    }

    fn delete(&self, id: u64) -> bool {
        self.0.write().unwrap_or_else(|e| e.into_inner()).patients.remove(&id).is_some()
    }
}

const FIRST_NAMES: &[&str] = &["James", "Mary", "John", "Patricia", "Robert", "Jennifer", "Michael", "Linda", "William", "Elizabeth"];
const LAST_NAMES: &[&str] = &["Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez", "Martinez"];
const GENDERS: &[&str] = &["Male", "Female", "Other"];

/// Uses the thread-local generator, seeded once per thread.
fn random_patient() -> Patient {
    let mut rng = rand::thread_rng();
    let first = FIRST_NAMES.choose(&mut rng).copied().unwrap_or("Alex");
    let last = LAST_NAMES.choose(&mut rng).copied().unwrap_or("Doe");
    Patient {
        id: 0,
        first_name: first.to_owned(),
        last_name: last.to_owned(),
        birth_date: format!(
            "{:04}-{:02}-{:02}",
            rng.gen_range(1940..=2020),
            rng.gen_range(1..=12),
            rng.gen_range(1..=28),
        ),
        gender: GENDERS.choose(&mut rng).copied().unwrap_or("Other").to_owned(),
        email: format!("{}.{}@example.com", first.to_lowercase(), last.to_lowercase()),
        phone: format!(
            "{:03}-{:03}-{:04}",
            rng.gen_range(0..1000),
            rng.gen_range(0..1000),
            rng.gen_range(0..10000),
        ),
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

fn json<T: Serialize>(status: StatusCode, value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(bytes) => Response::builder().status(status).json(bytes),
        Err(_) => Response::status(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

fn patient_id(req: &Request) -> Option<u64> {
    req.param("id")?.parse().ok()
}

async fn list_patients(store: Arc<PatientStore>, _req: Request) -> Response {
    json(StatusCode::OK, &store.list())
}

async fn create_patient(store: Arc<PatientStore>, req: Request) -> Response {
    match serde_json::from_slice::<Patient>(req.body()) {
        Ok(patient) => json(StatusCode::CREATED, &store.create(patient)),
        Err(_) => Response::builder().status(StatusCode::BAD_REQUEST).text("invalid request body"),
    }
}

async fn get_patient(store: Arc<PatientStore>, req: Request) -> Response {
    let Some(id) = patient_id(&req) else {
        return Response::builder().status(StatusCode::BAD_REQUEST).text("invalid patient id");
    };
    match store.get(id) {
        Some(patient) => json(StatusCode::OK, &patient),
        None => Response::builder().status(StatusCode::NOT_FOUND).text("patient not found"),
    }
}

async fn update_patient(store: Arc<PatientStore>, req: Request) -> Response {
    let Some(id) = patient_id(&req) else {
        return Response::builder().status(StatusCode::BAD_REQUEST).text("invalid patient id");
    };
    let Ok(patient) = serde_json::from_slice::<Patient>(req.body()) else {
        return Response::builder().status(StatusCode::BAD_REQUEST).text("invalid request body");
    };
    match store.update(id, patient) {
        Some(updated) => json(StatusCode::OK, &updated),
        None => Response::builder().status(StatusCode::NOT_FOUND).text("patient not found"),
    }
}

async fn delete_patient(store: Arc<PatientStore>, req: Request) -> Response {
    let Some(id) = patient_id(&req) else {
        return Response::builder().status(StatusCode::BAD_REQUEST).text("invalid patient id");
    };
    if store.delete(id) {
        Response::status(StatusCode::NO_CONTENT)
    } else {
        Response::builder().status(StatusCode::NOT_FOUND).text("patient not found")
    }
}

/// Binds a store-taking handler into a plain `Request -> Response` one.
fn with_store<F, Fut>(
    store: Arc<PatientStore>,
    handler: F,
) -> impl Fn(Request) -> Fut + Send + Sync + 'static
where
    F: Fn(Arc<PatientStore>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    move |req| handler(Arc::clone(&store), req)
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), httpshape::Error> {
    tracing_subscriber::fmt::init();

    let rate: SampleRate = std::env::var("SAMPLE_RATE")
        .unwrap_or_else(|_| "1.0".to_owned())
        .parse()?;
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());

    let store = Arc::new(PatientStore::seeded(5));
    let logger: Arc<dyn MetadataLogger> = Arc::new(TracingLogger);
    let rate = rate.get();

    let app = Router::new()
        .get("/patients", instrument(with_store(store.clone(), list_patients), rate, logger.clone())?)
        .post("/patients", instrument(with_store(store.clone(), create_patient), rate, logger.clone())?)
        .get("/patients/{id}", instrument(with_store(store.clone(), get_patient), rate, logger.clone())?)
        .put("/patients/{id}", instrument(with_store(store.clone(), update_patient), rate, logger.clone())?)
        .delete("/patients/{id}", instrument(with_store(store.clone(), delete_patient), rate, logger)?);

    tracing::info!(%addr, sample_rate = rate, "patient records server starting");
    Server::bind(&addr).serve(app).await
}
