use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::JoinHandle;
use std::time::Duration;

use evalia_core::models::submission::SubmissionRequest;
use evalia_player::http::HttpSubmitter;
use evalia_session::submitter::Submitter;

fn request() -> SubmissionRequest {
    serde_json::from_value(serde_json::json!({
        "submissionId": "6f1c2e4a-8b7d-4c3e-9a1f-2d5e6b7c8d9e",
        "evaluationId": "js-basics",
        "learnerId": "ana",
        "attemptNumber": 1,
        "answers": { "q1": "push()" },
        "submittedAt": "2026-03-01T10:00:00Z"
    }))
    .unwrap()
}

/// Answer one request with `status` and `body`; the thread yields the
/// request body it received.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/submissions", listener.local_addr().unwrap());
    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut content_length = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':')
                && name.eq_ignore_ascii_case("content-length")
            {
                content_length = value.trim().parse().unwrap();
            }
        }
        let mut received = vec![0; content_length];
        reader.read_exact(&mut received).unwrap();

        write!(
            stream,
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
        stream.flush().unwrap();
        String::from_utf8(received).unwrap()
    });
    (url, server)
}

#[tokio::test]
async fn ok_response_with_ack_is_an_acknowledgment() {
    let (url, server) = serve_once("200 OK", r#"{"accepted": false, "message": "late"}"#);
    let submitter = HttpSubmitter::new(url, Duration::from_secs(5));

    let ack = submitter.submit(&request()).await.unwrap();
    assert!(!ack.accepted);
    assert_eq!(ack.message.as_deref(), Some("late"));

    let sent: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
    assert_eq!(sent["evaluationId"], "js-basics");
    assert_eq!(sent["learnerId"], "ana");
    assert_eq!(sent["answers"]["q1"], "push()");
}

#[tokio::test]
async fn ok_response_with_garbage_body_is_retryable() {
    let (url, server) = serve_once("200 OK", "<html>maintenance</html>");
    let submitter = HttpSubmitter::new(url, Duration::from_secs(5));

    let err = submitter.submit(&request()).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(err.to_string().contains("unreadable acknowledgment"));
    server.join().unwrap();
}

#[tokio::test]
async fn server_error_is_retryable() {
    let (url, server) = serve_once("500 Internal Server Error", r#"{"error": "boom"}"#);
    let submitter = HttpSubmitter::new(url, Duration::from_secs(5));

    let err = submitter.submit(&request()).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(err.to_string().contains("HTTP 500"));
    server.join().unwrap();
}

#[tokio::test]
async fn unreachable_backend_is_retryable() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/submissions", listener.local_addr().unwrap());
    drop(listener);

    let submitter = HttpSubmitter::new(url, Duration::from_secs(5));
    let err = submitter.submit(&request()).await.unwrap_err();
    assert!(err.is_retryable());
}
