//! Round trips through the reqwest client against a local HTTP listener.

use entistream_sync::{
    CancellationToken, CollectorSink, HttpSource, HttpSourceConfig, Pipeline, SyncError,
    TransportError,
};
use entistream_testkit::StreamBuilder;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;

/// Serves one canned response per connection, reporting each request head.
fn serve(responses: Vec<(u16, String)>) -> (String, mpsc::Receiver<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for (status, body) in responses {
            let (stream, _) = match listener.accept() {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let mut reader = BufReader::new(stream);
            let mut head = Vec::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    break;
                }
                let line = line.trim_end().to_string();
                if line.is_empty() {
                    break;
                }
                head.push(line);
            }
            let _ = tx.send(head);

            let reason = if status == 200 { "OK" } else { "Not Found" };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let mut stream = reader.into_inner();
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
        }
    });

    (format!("http://{addr}/datasets/people/changes"), rx)
}

#[test]
fn streams_entities_with_bearer_token() {
    let body = StreamBuilder::people()
        .people_entities("r", 3)
        .continuation("after-r")
        .build();
    let (url, heads) = serve(vec![(200, body)]);

    let config = HttpSourceConfig::new(url).with_token("sekret");
    let source = HttpSource::new(config).unwrap();
    let mut pipeline = Pipeline::new(source, CollectorSink::new());
    let report = pipeline.sync(&CancellationToken::new(), None, 3).unwrap();

    assert_eq!(report.entities, 3);
    assert_eq!(report.continuation.as_deref(), Some("after-r"));
    let (_, sink) = pipeline.into_parts();
    assert_eq!(sink.entities()[0].id, "people:r0");

    let head = heads.recv().unwrap();
    assert!(head[0].starts_with("GET /datasets/people/changes "));
    assert!(head
        .iter()
        .any(|l| l.eq_ignore_ascii_case("authorization: Bearer sekret")));
}

#[test]
fn missing_dataset_is_not_found() {
    let (url, heads) = serve(vec![(404, String::new())]);

    let source = HttpSource::new(HttpSourceConfig::new(url)).unwrap();
    let mut pipeline = Pipeline::new(source, CollectorSink::new());
    let err = pipeline
        .sync(&CancellationToken::new(), Some("t1"), 10)
        .unwrap_err();

    assert!(matches!(err, SyncError::Transport(TransportError::NotFound)));
    let head = heads.recv().unwrap();
    assert!(head[0].starts_with("GET /datasets/people/changes?since=t1 "));
}
