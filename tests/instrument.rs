//! Behavior of the instrumentation middleware, driven without a socket.

mod support;

use std::sync::Arc;
use std::time::Duration;

use httpshape::middleware::{Instrument, MetadataLogger, Outcome, RequestMetadata, ResponseMetadata};
use httpshape::{ContentType, Method, Request, Response, StatusCode};
use serde_json::json;
use support::{Spy, drive};

fn patients_json() -> Vec<u8> {
    serde_json::to_vec(&json!([
        { "id": 1, "first_name": "Mary", "last_name": "Smith" },
        { "id": 2, "first_name": "John", "last_name": "Garcia" },
    ]))
    .unwrap()
}

async fn list_patients(_req: Request) -> Response {
    tokio::time::sleep(Duration::from_millis(2)).await;
    Response::json(patients_json())
}

fn instrumented(handler: impl httpshape::Handler, rate: f64) -> (Instrument, Arc<Spy>) {
    let spy = Arc::new(Spy::default());
    let instrument = Instrument::new(handler, rate, spy.clone()).unwrap();
    (instrument, spy)
}

#[tokio::test]
async fn rate_zero_never_calls_the_logger() {
    let (instrument, spy) = instrumented(list_patients, 0.0);

    for _ in 0..200 {
        let (status, _) = drive(&instrument, Request::builder().path("/patients").build()).await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(spy.calls(), 0);
}

#[tokio::test]
async fn rate_one_logs_exactly_one_pair_per_request() {
    let (instrument, spy) = instrumented(list_patients, 1.0);

    for _ in 0..50 {
        drive(&instrument, Request::builder().path("/patients").build()).await;
    }

    assert_eq!(spy.requests().len(), 50);
    assert_eq!(spy.responses().len(), 50);
}

#[tokio::test]
async fn half_rate_samples_about_half() {
    async fn tiny(_req: Request) -> Response { Response::text("k") }
    let (instrument, spy) = instrumented(tiny, 0.5);

    for _ in 0..10_000 {
        drive(&instrument, Request::builder().build()).await;
    }

    let requests = spy.requests().len();
    assert_eq!(requests, spy.responses().len());
    let fraction = requests as f64 / 10_000.0;
    assert!((0.45..=0.55).contains(&fraction), "observed {fraction}");
}

#[tokio::test]
async fn get_patients_scenario() {
    let (instrument, spy) = instrumented(list_patients, 1.0);
    let req = Request::builder()
        .method(Method::GET)
        .path("/patients")
        .header("user-agent", "scenario/1.0")
        .remote_addr("203.0.113.5:51000".parse().unwrap())
        .build();

    let (status, body) = drive(&instrument, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], &patients_json()[..]);

    let requests = spy.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/patients");
    assert_eq!(requests[0].remote_addr, "203.0.113.5:51000");
    assert_eq!(requests[0].user_agent, "scenario/1.0");
    assert_eq!(requests[0].content_type, "");

    let responses = spy.responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].status, 200);
    assert_eq!(responses[0].content_length, patients_json().len() as u64);
    assert!(responses[0].duration >= Duration::from_millis(2));
    assert_eq!(responses[0].outcome, Outcome::Completed);
}

#[tokio::test]
async fn streamed_bytes_arrive_unchanged_whether_sampled_or_not() {
    async fn stream(_req: Request) -> Response {
        let (tx, res) = Response::builder().streaming(ContentType::OctetStream);
        tokio::spawn(async move {
            for chunk in [&[0u8, 159, 146, 150][..], &b""[..], &b"\r\n\r\n"[..], &[255; 300][..]] {
                if tx.send(chunk.to_vec()).await.is_err() {
                    return;
                }
            }
        });
        res
    }

    let mut expected = vec![0u8, 159, 146, 150];
    expected.extend_from_slice(b"\r\n\r\n");
    expected.extend_from_slice(&[255; 300]);

    for rate in [0.0, 1.0] {
        let (instrument, spy) = instrumented(stream, rate);
        let (_, body) = drive(&instrument, Request::builder().build()).await;
        assert_eq!(&body[..], &expected[..], "rate {rate}");

        if rate == 1.0 {
            assert_eq!(spy.responses()[0].content_length, expected.len() as u64);
        } else {
            assert_eq!(spy.calls(), 0);
        }
    }
}

#[tokio::test]
async fn response_head_passes_through_untouched() {
    async fn created(_req: Request) -> Response {
        Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/patients/6")
            .json(br#"{"id":6}"#.to_vec())
    }
    let (instrument, spy) = instrumented(created, 1.0);

    let res = instrument.call(Request::builder().method(Method::POST).build()).await;
    assert_eq!(res.status_code(), StatusCode::CREATED);
    assert_eq!(res.headers()["location"], "/patients/6");
    assert_eq!(res.headers()["content-type"], "application/json");
    drop(res);

    // Dropped before the body went out: cancelled, nothing counted.
    let responses = spy.responses();
    assert_eq!(responses[0].status, 201);
    assert_eq!(responses[0].content_length, 0);
    assert_eq!(responses[0].outcome, Outcome::Cancelled);
}

#[tokio::test]
async fn concurrent_requests_keep_their_own_metadata() {
    async fn delayed(req: Request) -> Response {
        if req.path() == "/slow" {
            tokio::time::sleep(Duration::from_millis(60)).await;
            Response::builder().status(StatusCode::CREATED).text("slow")
        } else {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Response::builder().status(StatusCode::NOT_FOUND).text("no")
        }
    }
    let (instrument, spy) = instrumented(delayed, 1.0);

    let (slow, fast) = tokio::join!(
        drive(&instrument, Request::builder().path("/slow").build()),
        drive(&instrument, Request::builder().path("/fast").build()),
    );
    assert_eq!(slow, (StatusCode::CREATED, "slow".into()));
    assert_eq!(fast, (StatusCode::NOT_FOUND, "no".into()));

    let requests = spy.requests();
    let responses = spy.responses();
    assert_eq!(requests.len(), 2);
    assert_eq!(responses.len(), 2);

    // The fast request finishes first; each pair is logged back to back.
    assert_eq!(requests[0].path, "/fast");
    assert_eq!(responses[0].status, 404);
    assert_eq!(responses[0].content_length, 2);
    assert!(responses[0].duration >= Duration::from_millis(5));

    assert_eq!(requests[1].path, "/slow");
    assert_eq!(responses[1].status, 201);
    assert_eq!(responses[1].content_length, 4);
    assert!(responses[1].duration >= Duration::from_millis(60));
    assert!(responses[1].duration > responses[0].duration);
}

#[tokio::test]
async fn handler_panic_is_logged_then_resumed() {
    async fn explode(_req: Request) -> Response {
        panic!("patient store unavailable")
    }
    let (instrument, spy) = instrumented(explode, 1.0);
    let instrument = Arc::new(instrument);

    let task = {
        let instrument = Arc::clone(&instrument);
        tokio::spawn(async move { instrument.call(Request::builder().path("/patients").build()).await })
    };
    let err = task.await.err().expect("handler panic must propagate");
    assert!(err.is_panic());
    let payload = err.into_panic();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"patient store unavailable"));

    let requests = spy.requests();
    let responses = spy.responses();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/patients");
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].status, 500);
    assert_eq!(responses[0].content_length, 0);
    assert_eq!(responses[0].outcome, Outcome::Failed);
}

#[tokio::test]
async fn cancelled_request_still_reports_partial_metadata() {
    async fn stuck(_req: Request) -> Response {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Response::text("too late")
    }
    let (instrument, spy) = instrumented(stuck, 1.0);

    let call = instrument.call(Request::builder().path("/stuck").build());
    assert!(tokio::time::timeout(Duration::from_millis(10), call).await.is_err());

    let responses = spy.responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].status, 500);
    assert_eq!(responses[0].outcome, Outcome::Cancelled);
    assert!(responses[0].duration >= Duration::from_millis(10));
}

#[tokio::test]
async fn panicking_logger_does_not_fail_the_request() {
    struct Broken;
    impl MetadataLogger for Broken {
        fn log_request(&self, _: &RequestMetadata) {
            panic!("log sink offline");
        }
        fn log_response(&self, _: &ResponseMetadata) {}
    }

    let instrument = Instrument::new(list_patients, 1.0, Arc::new(Broken)).unwrap();
    let (status, body) = drive(&instrument, Request::builder().build()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], &patients_json()[..]);
}

#[test]
fn out_of_range_rate_is_a_construction_error() {
    for rate in [-0.5, 1.5, f64::NAN] {
        let result = Instrument::new(list_patients, rate, Arc::new(Spy::default()));
        assert!(matches!(result, Err(httpshape::Error::Config(_))));
    }
}
