//! HTTP transport layer for talking to the inverter's web interface.
//!
//! Provides a trait-based abstraction over the device endpoints,
//! enabling both real hardware and mock testing.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::{multipart, Client, Response};
use reqwest::Url;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use super::config::{
    FWUPDATE_PATH, SWD_FLASH_PATH, SWD_RESET_PATH, UPLOAD_FIELD_NAME, UPLOAD_PATH,
};
use super::error::{UpdateError, UpdateResult};
use super::image::FlashTarget;

/// Trait for device transport operations.
///
/// Every call is a blocking round trip; drivers sequence them.
#[cfg_attr(test, automock)]
pub trait DeviceTransport: Send + Sync {
    /// Store a file in the device file store under `name`.
    fn upload(&self, name: &str, data: Vec<u8>) -> UpdateResult<()>;

    /// Run one paged update step and return the raw response body.
    fn flash_step(&self, step: i64, file: &str) -> UpdateResult<String>;

    /// Start a streamed flash and return the still-growing response body.
    fn open_flash_stream(
        &self,
        target: FlashTarget,
        file: &str,
    ) -> UpdateResult<Box<dyn Read + Send>>;

    /// Hard-reset the target through the debug probe.
    fn hard_reset(&self) -> UpdateResult<()>;
}

/// Device endpoints and their query strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint<'a> {
    Upload,
    FlashStep { step: i64, file: &'a str },
    FlashStream { target: FlashTarget, file: &'a str },
    HardReset,
}

impl Endpoint<'_> {
    /// Path component, used in error messages.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Upload => UPLOAD_PATH,
            Endpoint::FlashStep { .. } => FWUPDATE_PATH,
            Endpoint::FlashStream { .. } => SWD_FLASH_PATH,
            Endpoint::HardReset => SWD_RESET_PATH,
        }
    }

    /// Resolve this endpoint against the device base URL.
    pub fn url(&self, base: &Url) -> UpdateResult<Url> {
        let mut url = base.join(self.path()).map_err(|e| {
            UpdateError::user_input(format!("invalid device URL {}: {}", base, e))
        })?;

        match self {
            Endpoint::Upload => {}
            Endpoint::FlashStep { step, file } => {
                url.query_pairs_mut()
                    .append_pair("step", &step.to_string())
                    .append_pair("file", file);
            }
            Endpoint::FlashStream { target, file } => {
                url.query_pairs_mut()
                    .append_key_only(target.query_flag())
                    .append_pair("file", file);
            }
            Endpoint::HardReset => {
                url.query_pairs_mut().append_key_only("hard");
            }
        }

        Ok(url)
    }
}

/// HTTP transport implementation backed by a blocking reqwest client.
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport for the device at `device_url`.
    ///
    /// Only the connect phase is bounded; a device that stops answering
    /// mid-flash leaves the request waiting.
    pub fn new(device_url: &str, connect_timeout: Duration) -> UpdateResult<Self> {
        let base_url = Url::parse(device_url).map_err(|e| {
            UpdateError::user_input(format!("invalid device URL {}: {}", device_url, e))
        })?;

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(None)
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn get(&self, endpoint: Endpoint<'_>) -> UpdateResult<Response> {
        let url = endpoint.url(&self.base_url)?;
        debug!(%url, "GET");
        let response = self.client.get(url).send()?;
        check_status(response, &endpoint)
    }
}

/// Map non-success statuses to a transport error.
fn check_status(response: Response, endpoint: &Endpoint<'_>) -> UpdateResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(UpdateError::HttpStatus {
            status: status.as_u16(),
            endpoint: endpoint.path().to_string(),
        })
    }
}

impl DeviceTransport for HttpTransport {
    fn upload(&self, name: &str, data: Vec<u8>) -> UpdateResult<()> {
        let endpoint = Endpoint::Upload;
        let url = endpoint.url(&self.base_url)?;
        debug!(%url, name, bytes = data.len(), "POST multipart");

        let part = multipart::Part::bytes(data)
            .file_name(name.to_string())
            .mime_str("application/octet-stream")?;
        let form = multipart::Form::new().part(UPLOAD_FIELD_NAME, part);

        let response = self.client.post(url).multipart(form).send()?;
        check_status(response, &endpoint)?;
        Ok(())
    }

    fn flash_step(&self, step: i64, file: &str) -> UpdateResult<String> {
        let response = self.get(Endpoint::FlashStep { step, file })?;
        Ok(response.text()?)
    }

    fn open_flash_stream(
        &self,
        target: FlashTarget,
        file: &str,
    ) -> UpdateResult<Box<dyn Read + Send>> {
        let response = self.get(Endpoint::FlashStream { target, file })?;
        Ok(Box::new(response))
    }

    fn hard_reset(&self) -> UpdateResult<()> {
        self.get(Endpoint::HardReset)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::error::ErrorKind;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    fn base() -> Url {
        Url::parse("http://192.168.4.1").unwrap()
    }

    /// Answer one request on a local port with a canned response and hand
    /// back the raw request.
    fn serve_once(status: &'static str, body: &'static str) -> (HttpTransport, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            write!(
                stream,
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            )
            .unwrap();
            request
        });

        let transport =
            HttpTransport::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
        (transport, handle)
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];

        let header_end = loop {
            let n = stream.read(&mut buf).unwrap();
            assert!(n > 0, "client closed before sending headers");
            raw.extend_from_slice(&buf[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let headers = String::from_utf8_lossy(&raw[..header_end]).to_ascii_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .map(|value| value.trim().parse::<usize>().unwrap());
        let chunked = headers.contains("transfer-encoding: chunked");

        loop {
            let body = &raw[header_end..];
            let done = match content_length {
                Some(len) => body.len() >= len,
                None if chunked => body.ends_with(b"0\r\n\r\n"),
                None => true,
            };
            if done {
                break;
            }
            let n = stream.read(&mut buf).unwrap();
            assert!(n > 0, "client closed mid-body");
            raw.extend_from_slice(&buf[..n]);
        }

        String::from_utf8_lossy(&raw).into_owned()
    }

    fn request_line(request: &str) -> &str {
        request.lines().next().unwrap_or_default()
    }

    #[test]
    fn test_upload_sends_updatefile_part() {
        let (transport, server) = serve_once("200 OK", "");

        transport.upload("update.bin", b"firmware-image".to_vec()).unwrap();

        let request = server.join().unwrap();
        assert_eq!(request_line(&request), "POST /edit HTTP/1.1");
        assert!(request.contains(r#"name="updatefile"; filename="update.bin""#));
        assert!(request.contains("firmware-image"));
    }

    #[test]
    fn test_flash_step_returns_body() {
        let (transport, server) = serve_once("200 OK", r#"{"pages":4}"#);

        let body = transport.flash_step(-1, "/update.bin").unwrap();

        assert_eq!(body, r#"{"pages":4}"#);
        let request = server.join().unwrap();
        assert_eq!(
            request_line(&request),
            "GET /fwupdate?step=-1&file=%2Fupdate.bin HTTP/1.1"
        );
    }

    #[test]
    fn test_open_flash_stream_yields_raw_body() {
        let (transport, server) = serve_once("200 OK", "16 bytes\n32 bytes\n");

        let mut body = String::new();
        transport
            .open_flash_stream(FlashTarget::Bootloader, "bootloader.bin")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();

        assert_eq!(body, "16 bytes\n32 bytes\n");
        let request = server.join().unwrap();
        assert_eq!(
            request_line(&request),
            "GET /swd/mem/flash?bootloader&file=bootloader.bin HTTP/1.1"
        );
    }

    #[test]
    fn test_error_status_is_transport_error() {
        let (transport, server) = serve_once("500 Internal Server Error", "busy");

        let err = transport.hard_reset().unwrap_err();
        server.join().unwrap();

        assert_eq!(err.kind(), ErrorKind::Transport);
        match err {
            UpdateError::HttpStatus { status, endpoint } => {
                assert_eq!(status, 500);
                assert_eq!(endpoint, "/swd/reset");
            }
            other => panic!("expected HttpStatus, got {:?}", other),
        }
    }

    #[test]
    fn test_upload_error_status() {
        let (transport, server) = serve_once("404 Not Found", "");

        let err = transport.upload("update.bin", vec![0; 16]).unwrap_err();
        server.join().unwrap();

        assert!(matches!(err, UpdateError::HttpStatus { status: 404, .. }));
    }

    #[test]
    fn test_upload_url() {
        let url = Endpoint::Upload.url(&base()).unwrap();
        assert_eq!(url.as_str(), "http://192.168.4.1/edit");
    }

    #[test]
    fn test_flash_step_url() {
        let url = Endpoint::FlashStep {
            step: -1,
            file: "/update.bin",
        }
        .url(&base())
        .unwrap();

        assert_eq!(url.path(), "/fwupdate");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("step".to_string(), "-1".to_string()),
                ("file".to_string(), "/update.bin".to_string()),
            ]
        );
    }

    #[test]
    fn test_flash_stream_url_bootloader() {
        let url = Endpoint::FlashStream {
            target: FlashTarget::Bootloader,
            file: "bootloader.bin",
        }
        .url(&base())
        .unwrap();

        assert_eq!(
            url.as_str(),
            "http://192.168.4.1/swd/mem/flash?bootloader&file=bootloader.bin"
        );
    }

    #[test]
    fn test_flash_stream_url_application() {
        let url = Endpoint::FlashStream {
            target: FlashTarget::Application,
            file: "app.bin",
        }
        .url(&base())
        .unwrap();

        assert_eq!(
            url.as_str(),
            "http://192.168.4.1/swd/mem/flash?flash&file=app.bin"
        );
    }

    #[test]
    fn test_hard_reset_url() {
        let url = Endpoint::HardReset.url(&base()).unwrap();
        assert_eq!(url.as_str(), "http://192.168.4.1/swd/reset?hard");
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let result = HttpTransport::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(UpdateError::UserInput { .. })));
    }

    #[test]
    fn test_new_keeps_base_url() {
        let transport =
            HttpTransport::new("http://inverter.local", Duration::from_secs(1)).unwrap();
        assert_eq!(transport.base_url().host_str(), Some("inverter.local"));
    }
}
