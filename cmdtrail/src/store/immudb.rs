//! # immudb
//!
//! Store implementation talking to immudb through its HTTP/JSON gateway.
//! Byte fields are base64 encoded, as the gateway maps protobuf `bytes` this
//! way.

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine};
use log::warn;
use reqwest::{blocking::Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{AuthError, Credentials, Session, Store, StoreError, Token};
use crate::config::StoreConfig;

const LOGIN_PATH: &str = "login";
const SET_PATH: &str = "db/set";

#[derive(Debug, Serialize)]
struct LoginRequest {
    user: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(default)]
    warning: Option<String>,
}

#[derive(Debug, Serialize)]
struct SetRequest {
    #[serde(rename = "KVs")]
    kvs: Vec<KeyValue>,
}

#[derive(Debug, Serialize)]
struct KeyValue {
    key: String,
    value: String,
}

pub(crate) struct ImmudbClient {
    base_url: String,
    http: Client,
}

impl ImmudbClient {
    pub(crate) fn new(config: &StoreConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .user_agent(concat!("cmdtrail/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

impl Store for ImmudbClient {
    fn login(&self, credentials: &Credentials) -> Result<Token, AuthError> {
        let request = LoginRequest {
            user: STANDARD.encode(&credentials.username),
            password: STANDARD.encode(&credentials.password),
        };

        let response = self
            .http
            .post(self.endpoint(LOGIN_PATH))
            .json(&request)
            .send()
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        match status {
            s if s.is_success() => (),
            s if s == StatusCode::UNAUTHORIZED || s == StatusCode::FORBIDDEN => {
                return Err(AuthError::InvalidCredentials(credentials.username.clone()))
            }
            s if s.is_server_error() => {
                return Err(AuthError::Unavailable(format!("login returned {s}")))
            }
            s => return Err(AuthError::Protocol(format!("login returned {s}"))),
        }

        let response: LoginResponse = response
            .json()
            .map_err(|e| AuthError::Protocol(e.to_string()))?;
        if response.token.is_empty() {
            return Err(AuthError::Protocol("empty token".to_string()));
        }

        // immudb warns when the default password is still in use.
        if let Some(warning) = response
            .warning
            .and_then(|w| STANDARD.decode(w).ok())
            .filter(|w| !w.is_empty())
        {
            warn!("Store: {}", String::from_utf8_lossy(&warning));
        }

        Ok(Token::new(response.token))
    }

    fn set(&self, session: &Session, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let request = SetRequest {
            kvs: vec![KeyValue {
                key: STANDARD.encode(key),
                value: STANDARD.encode(value),
            }],
        };

        let response = self
            .http
            .post(self.endpoint(SET_PATH))
            .header(reqwest::header::AUTHORIZATION, session.token().as_str())
            .json(&request)
            .send()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response
            .text()
            .unwrap_or_else(|_| "unable to read the response body".to_string());
        Err(match status {
            s if s == StatusCode::UNAUTHORIZED => StoreError::Unauthorized(message),
            s if s.is_server_error() => StoreError::Unavailable(format!("{s}: {message}")),
            s => StoreError::Rejected {
                status: s.as_u16(),
                message,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufRead, BufReader, Read, Write},
        net::TcpListener,
        thread::{self, JoinHandle},
    };

    use super::*;

    // Serves a single HTTP request with the given status and body. Returns the
    // base URL and a handle giving back the raw request (head and body).
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/api", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);

            let mut request = String::new();
            let mut len = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        len = value.trim().parse().unwrap();
                    }
                }
                request.push_str(&line);
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut body_in = vec![0; len];
            reader.read_exact(&mut body_in).unwrap();
            request.push_str(&String::from_utf8(body_in).unwrap());

            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            stream.flush().unwrap();
            request
        });

        (url, handle)
    }

    fn client(url: &str) -> ImmudbClient {
        let mut store = ImmudbClient::new(&StoreConfig {
            url: url.to_string(),
            ..Default::default()
        })
        .unwrap();
        // Don't let a proxy from the environment get in the way.
        store.http = Client::builder().no_proxy().build().unwrap();
        store
    }

    fn creds() -> Credentials {
        Credentials {
            username: "immudb".to_string(),
            password: "immudb".to_string(),
        }
    }

    fn session(store: &ImmudbClient) -> Session {
        Session::open(store, &creds()).unwrap()
    }

    // Address nothing listens on.
    fn closed_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/api")
    }

    #[test]
    fn login() {
        let (url, server) = serve_once("200 OK", r#"{"token":"t0k3n","warning":""}"#);
        let store = client(&format!("{url}/"));

        let token = store.login(&creds()).unwrap();
        assert_eq!(token.as_str(), "t0k3n");

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /api/login HTTP/1.1\r\n"));
        assert!(request.ends_with(r#"{"user":"aW1tdWRi","password":"aW1tdWRi"}"#));
    }

    #[test]
    fn login_refused() {
        let (url, server) = serve_once("401 Unauthorized", r#"{"error":"invalid user name or password"}"#);
        assert!(matches!(
            client(&url).login(&creds()),
            Err(AuthError::InvalidCredentials(_))
        ));
        server.join().unwrap();
    }

    #[test]
    fn login_empty_token() {
        let (url, server) = serve_once("200 OK", r#"{"token":""}"#);
        assert!(matches!(
            client(&url).login(&creds()),
            Err(AuthError::Protocol(_))
        ));
        server.join().unwrap();
    }

    #[test]
    fn login_unavailable() {
        assert!(matches!(
            client(&closed_url()).login(&creds()),
            Err(AuthError::Unavailable(_))
        ));
    }

    #[test]
    fn set() {
        let (url, server) = serve_once("200 OK", r#"{"token":"t0k3n"}"#);
        let store = client(&url);
        let session = session(&store);
        server.join().unwrap();

        let (url, server) = serve_once("200 OK", r#"{"id":"1"}"#);
        let store = client(&url);
        store
            .set(&session, b"bash:1:abc", br#"{"pid":1,"command":"ls -la"}"#)
            .unwrap();

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /api/db/set HTTP/1.1\r\n"));
        assert!(request
            .lines()
            .any(|l| l.eq_ignore_ascii_case("authorization: t0k3n")));
        let body: serde_json::Value =
            serde_json::from_str(request.rsplit("\r\n\r\n").next().unwrap()).unwrap();
        assert_eq!(body["KVs"][0]["key"], STANDARD.encode("bash:1:abc"));
        assert_eq!(
            body["KVs"][0]["value"],
            STANDARD.encode(r#"{"pid":1,"command":"ls -la"}"#)
        );
    }

    #[test]
    fn set_errors() {
        let (url, server) = serve_once("200 OK", r#"{"token":"t0k3n"}"#);
        let session = session(&client(&url));
        server.join().unwrap();

        let (url, server) = serve_once("401 Unauthorized", r#"{"error":"token has expired"}"#);
        assert!(matches!(
            client(&url).set(&session, b"k", b"v"),
            Err(StoreError::Unauthorized(m)) if m.contains("expired")
        ));
        server.join().unwrap();

        let (url, server) = serve_once("400 Bad Request", r#"{"error":"nope"}"#);
        assert!(matches!(
            client(&url).set(&session, b"k", b"v"),
            Err(StoreError::Rejected { status: 400, .. })
        ));
        server.join().unwrap();

        assert!(matches!(
            client(&closed_url()).set(&session, b"k", b"v"),
            Err(StoreError::Unavailable(_))
        ));
    }
}
