use chrono::{DateTime, FixedOffset, TimeZone};
use fangjia_domain::entities::catalog::CityCatalog;
use fangjia_domain::repositories::price_source::PriceSource;
use fangjia_infrastructure::gotohui::{CollectorSettings, GotohuiCollector};
use fangjia_infrastructure::http::{FetchPolicy, HttpPageFetcher};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

fn http_response(status: u16, reason: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Serves fixed bodies by request path; unknown paths get a 404. Returns the
/// base url and the list of requested paths.
fn try_spawn_router(routes: HashMap<String, String>) -> Option<(String, Arc<Mutex<Vec<String>>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").ok()?;
    let addr = listener.local_addr().ok()?;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else {
                continue;
            };
            let mut buf = [0u8; 4096];
            let n = stream.read(&mut buf).unwrap_or(0);
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let path = request
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .unwrap_or("/")
                .to_string();
            log.lock().expect("log").push(path.clone());
            let response = match routes.get(&path) {
                Some(body) => http_response(200, "OK", "text/html; charset=utf-8", body),
                None => http_response(404, "Not Found", "text/plain", "missing"),
            };
            let _ = stream.write_all(response.as_bytes());
        }
    });

    Some((format!("http://{}", addr), seen))
}

fn clock() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(8 * 3600)
        .unwrap()
        .with_ymd_and_hms(2025, 10, 18, 10, 0, 0)
        .unwrap()
}

fn year_page(rows: &[(&str, &str, &str)]) -> String {
    let body: String = rows
        .iter()
        .enumerate()
        .map(|(idx, (month, second, new))| {
            format!(
                "<tr><td>{}</td><td>{month}</td><td>{second}</td><td>{new}</td><td>-</td></tr>",
                idx + 1
            )
        })
        .collect();
    format!(
        "<html><body><h2>朝阳房价</h2><table><tr><th>序号</th><th>日期</th><th>二手房(元/㎡)</th><th>新房(元/㎡)</th><th>套均价</th></tr>{body}</table></body></html>"
    )
}

fn collector(base_url: String, years_window: u32) -> GotohuiCollector<HttpPageFetcher> {
    let fetcher = HttpPageFetcher::new(FetchPolicy::immediate(0)).expect("fetcher");
    GotohuiCollector::with_clock(
        fetcher,
        CityCatalog::builtin(),
        CollectorSettings {
            base_url,
            years_window,
        },
        clock,
    )
}

#[test]
fn collects_year_archive_pages_over_http() {
    let mut routes = HashMap::new();
    routes.insert(
        "/years/618/2025/".to_string(),
        year_page(&[("2025-09", "52040", "55894"), ("2025-08", "51,980", "55800")]),
    );
    routes.insert(
        "/years/618/2024/".to_string(),
        year_page(&[("2024-12", "53000", "56000")]),
    );
    let Some((base_url, seen)) = try_spawn_router(routes) else {
        eprintln!("skipping: cannot bind local test server");
        return;
    };

    let series = collector(base_url, 3)
        .collect("北京", "朝阳")
        .expect("live series");

    let months: Vec<_> = series.monthly_data.iter().map(|r| r.month.as_str()).collect();
    assert_eq!(months, vec!["2024-12", "2025-08", "2025-09"]);
    assert_eq!(series.current_price, Some(52040.0));
    assert_eq!(series.monthly_data[1].second_hand_price, 51980.0);
    assert_eq!(series.monthly_data[2].new_house_price, Some(55894.0));
    assert_eq!(series.crawl_time, "2025-10-18 10:00:00");

    let seen = seen.lock().expect("log").clone();
    assert_eq!(
        seen,
        vec!["/years/618/2025/", "/years/618/2024/", "/years/618/2023/"]
    );
}

#[test]
fn falls_back_to_legacy_page_and_then_gives_up() {
    let mut routes = HashMap::new();
    routes.insert(
        "/fjdata-2491".to_string(),
        "<div>1 2025-06 61000 68000</div>".to_string(),
    );
    let Some((base_url, _seen)) = try_spawn_router(routes) else {
        eprintln!("skipping: cannot bind local test server");
        return;
    };

    let source = collector(base_url, 2);
    let series = source.collect("上海", "浦东").expect("legacy series");
    assert_eq!(series.monthly_data.len(), 1);
    assert_eq!(series.monthly_data[0].new_house_price, Some(68000.0));

    assert!(source.collect("上海", "徐汇").is_none());
}
