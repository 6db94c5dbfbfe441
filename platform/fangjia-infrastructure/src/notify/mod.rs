use fangjia_domain::repositories::notifier::{Notification, Notifier, NotifyOutcome};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

pub const DEFAULT_SEND_URL: &str = "https://api.weixin.qq.com/cgi-bin/message/template/send";
pub const DEFAULT_TOKEN_URL: &str = "https://api.weixin.qq.com/cgi-bin/token";
const TRANSPORT_FAILURE: i64 = -1;

/// Credentials and endpoints of the messaging webhook. Credentials come from
/// the environment, never from the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct NotifierConfig {
    pub send_url: String,
    pub token_url: Option<String>,
    pub app_id: String,
    pub app_secret: String,
    pub timeout_ms: u64,
}

pub struct WebhookNotifier {
    config: NotifierConfig,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(config: NotifierConfig) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self { config, client })
    }

    fn access_token(&self, token_url: &str) -> Result<String, NotifyOutcome> {
        let resp = self
            .client
            .get(token_url)
            .query(&[
                ("grant_type", "client_credential"),
                ("appid", self.config.app_id.trim()),
                ("secret", self.config.app_secret.trim()),
            ])
            .send()
            .map_err(|err| failure(format!("token request failed: {err}")))?;
        let body: Value = resp
            .json()
            .map_err(|err| failure(format!("failed to parse token response: {err}")))?;

        match body.get("access_token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => Err(outcome_from_body(&body)
                .filter(|outcome| !outcome.is_success())
                .unwrap_or_else(|| failure("token response has no access_token".to_string()))),
        }
    }

    fn deliver(&self, notification: &Notification) -> NotifyOutcome {
        let mut request = self.client.post(&self.config.send_url);
        if let Some(token_url) = self.config.token_url.as_deref() {
            match self.access_token(token_url) {
                Ok(token) => request = request.query(&[("access_token", token)]),
                Err(outcome) => return outcome,
            }
        }

        let resp = match request.json(&message_body(notification)).send() {
            Ok(resp) => resp,
            Err(err) => return failure(format!("send request failed: {err}")),
        };
        let status = resp.status();
        match resp.json::<Value>() {
            Ok(body) => outcome_from_body(&body).unwrap_or_else(|| {
                failure(format!("unexpected response (HTTP {})", status.as_u16()))
            }),
            Err(err) => failure(format!(
                "failed to parse send response (HTTP {}): {err}",
                status.as_u16()
            )),
        }
    }
}

fn failure(message: String) -> NotifyOutcome {
    NotifyOutcome {
        status: TRANSPORT_FAILURE,
        message,
    }
}

fn outcome_from_body(body: &Value) -> Option<NotifyOutcome> {
    let status = body.get("errcode")?.as_i64()?;
    let message = body
        .get("errmsg")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(NotifyOutcome { status, message })
}

/// Template message payload understood by the webhook.
pub fn message_body(notification: &Notification) -> Value {
    json!({
        "touser": notification.recipient.trim(),
        "template_id": notification.template_id.trim(),
        "url": notification.url,
        "data": {
            "date": { "value": notification.title },
            "content": { "value": notification.summary },
            "remark": { "value": notification.remark },
        }
    })
}

impl Notifier for WebhookNotifier {
    fn send(&self, notification: &Notification) -> NotifyOutcome {
        let span = tracing::info_span!("infra.notify.send", url = %self.config.send_url);
        let _enter = span.enter();

        let start = Instant::now();
        let outcome = self.deliver(notification);
        let result_label = if outcome.is_success() { "ok" } else { "err" };
        metrics::counter!("fangjia.infra.notify.calls_total", "result" => result_label)
            .increment(1);
        metrics::histogram!("fangjia.infra.notify.call_ms", "result" => result_label)
            .record(start.elapsed().as_millis() as f64);
        if outcome.is_success() {
            tracing::info!("notification delivered");
        } else {
            tracing::warn!(status = outcome.status, message = %outcome.message, "notification rejected");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::{message_body, NotifierConfig, WebhookNotifier};
    use fangjia_domain::repositories::notifier::{Notification, Notifier};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    fn http_response(status: u16, reason: &str, content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn try_spawn_server(responses: Vec<String>) -> Option<(String, mpsc::Receiver<String>)> {
        let listener = TcpListener::bind("127.0.0.1:0").ok()?;
        let addr = listener.local_addr().ok()?;
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().expect("accept");
                let mut buf = [0u8; 8192];
                let n = stream.read(&mut buf).unwrap_or(0);
                let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());
                stream
                    .write_all(response.as_bytes())
                    .expect("write response");
            }
        });

        Some((format!("http://{}", addr), rx))
    }

    fn notification() -> Notification {
        Notification {
            recipient: " openid ".to_string(),
            template_id: "tpl".to_string(),
            title: "2025年10月18日 - 月度房价趋势推送".to_string(),
            summary: "📊 summary".to_string(),
            remark: "上午房价月报".to_string(),
            url: "https://example.github.io/repo/house_price_report.html?t=1".to_string(),
        }
    }

    fn config(base_url: &str, token: bool) -> NotifierConfig {
        NotifierConfig {
            send_url: format!("{base_url}/send"),
            token_url: token.then(|| format!("{base_url}/token")),
            app_id: "app".to_string(),
            app_secret: "secret".to_string(),
            timeout_ms: 2_000,
        }
    }

    #[test]
    fn message_body_matches_template_layout() {
        let body = message_body(&notification());
        assert_eq!(body["touser"], "openid");
        assert_eq!(body["data"]["remark"]["value"], "上午房价月报");
        assert_eq!(body["data"]["date"]["value"], "2025年10月18日 - 月度房价趋势推送");
    }

    #[test]
    fn send_fetches_token_then_posts_message() {
        let Some((base_url, requests)) = try_spawn_server(vec![
            http_response(200, "OK", "application/json", r#"{"access_token":"tok","expires_in":7200}"#),
            http_response(200, "OK", "application/json", r#"{"errcode":0,"errmsg":"ok"}"#),
        ]) else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };

        let notifier = WebhookNotifier::new(config(&base_url, true)).expect("notifier");
        let outcome = notifier.send(&notification());
        assert!(outcome.is_success());
        assert_eq!(outcome.message, "ok");

        let token_request = requests.recv().expect("token request");
        assert!(token_request.starts_with("GET /token?grant_type=client_credential&appid=app&secret=secret"));
        let send_request = requests.recv().expect("send request");
        assert!(send_request.starts_with("POST /send?access_token=tok"));
    }

    #[test]
    fn provider_errors_are_reported_as_status() {
        let Some((base_url, _requests)) = try_spawn_server(vec![http_response(
            200,
            "OK",
            "application/json",
            r#"{"errcode":40003,"errmsg":"invalid openid"}"#,
        )]) else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };

        let notifier = WebhookNotifier::new(config(&base_url, false)).expect("notifier");
        let outcome = notifier.send(&notification());
        assert_eq!(outcome.status, 40003);
        assert_eq!(outcome.message, "invalid openid");
    }

    #[test]
    fn missing_token_short_circuits() {
        let Some((base_url, _requests)) = try_spawn_server(vec![http_response(
            200,
            "OK",
            "application/json",
            r#"{"errcode":40013,"errmsg":"invalid appid"}"#,
        )]) else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };

        let notifier = WebhookNotifier::new(config(&base_url, true)).expect("notifier");
        let outcome = notifier.send(&notification());
        assert_eq!(outcome.status, 40013);
    }

    #[test]
    fn unreachable_endpoint_yields_transport_status() {
        let Ok(listener) = TcpListener::bind("127.0.0.1:0") else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };
        let Ok(addr) = listener.local_addr() else {
            return;
        };
        drop(listener);

        let notifier =
            WebhookNotifier::new(config(&format!("http://{addr}"), false)).expect("notifier");
        let outcome = notifier.send(&notification());
        assert_eq!(outcome.status, -1);
    }
}
