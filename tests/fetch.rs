use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use assert_matches::assert_matches;
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mdex_dl::error::MdexError;
use mdex_dl::fetch::{HttpFetcher, ResourceFetcher};

// The blocking client must not run inside the runtime, so the mock server is
// driven from a runtime owned by the test. Fields drop in order: server first.
struct Server {
    server: MockServer,
    rt: Runtime,
}

impl Server {
    fn start() -> Self {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        Self { server, rt }
    }

    fn mount(&self, route: &str, response: ResponseTemplate) {
        self.rt.block_on(
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(response)
                .mount(&self.server),
        );
    }

    fn url(&self, route: &str) -> String {
        format!("{}{route}", self.server.uri())
    }
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(Duration::from_secs(5)).unwrap()
}

#[test]
fn image_body_and_extension_are_returned() {
    let server = Server::start();
    server.mount(
        "/data/p1.png",
        ResponseTemplate::new(200)
            .insert_header("content-type", "image/png")
            .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
    );

    let mut payload = fetcher().fetch(&server.url("/data/p1.png")).unwrap();
    assert_eq!(payload.extension, "png");
    let mut body = Vec::new();
    payload.body.read_to_end(&mut body).unwrap();
    assert_eq!(body, vec![0x89, b'P', b'N', b'G']);
}

#[test]
fn jpeg_maps_to_jpg() {
    let server = Server::start();
    server.mount(
        "/data/p1",
        ResponseTemplate::new(200)
            .insert_header("content-type", "image/jpeg")
            .set_body_bytes(vec![1, 2, 3]),
    );

    let payload = fetcher().fetch(&server.url("/data/p1")).unwrap();
    assert_eq!(payload.extension, "jpg");
}

#[test]
fn error_status_is_remote_failure() {
    let server = Server::start();
    server.mount("/data/missing.jpg", ResponseTemplate::new(404));

    let url = server.url("/data/missing.jpg");
    let err = fetcher().fetch(&url).unwrap_err();
    assert_matches!(err, MdexError::Remote { url: failed, status } if failed == url && status.contains("404"));
}

#[test]
fn non_image_is_rejected() {
    let server = Server::start();
    server.mount(
        "/data/page",
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html; charset=utf-8")
            .set_body_bytes(b"<html></html>".to_vec()),
    );

    let err = fetcher().fetch(&server.url("/data/page")).unwrap_err();
    assert_matches!(err, MdexError::UnexpectedContentType { content_type, .. } if content_type.starts_with("text/html"));
}

#[test]
fn unreachable_host_is_transport_failure() {
    let err = fetcher()
        .fetch("http://127.0.0.1:9/data/p1.jpg")
        .unwrap_err();
    assert_matches!(err, MdexError::Transport { url, .. } if url == "http://127.0.0.1:9/data/p1.jpg");
}

// Serves one connection with a raw response, for headers a mock server won't emit.
fn serve_once(head: &'static [u8], body: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let read = stream.read(&mut buf).unwrap();
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buf[..read]);
        }
        stream.write_all(head).unwrap();
        stream
            .write_all(format!("Content-Length: {}\r\nConnection: close\r\n\r\n", body.len()).as_bytes())
            .unwrap();
        stream.write_all(body).unwrap();
    });
    format!("http://{addr}/data/p1")
}

#[test]
fn undecodable_content_type_is_rejected() {
    let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Type: text/h\xe9ml\r\n", b"<html></html>");

    let err = fetcher().fetch(&url).unwrap_err();
    assert_matches!(err, MdexError::UnexpectedContentType { content_type, .. } if content_type.starts_with("text/h"));
}
