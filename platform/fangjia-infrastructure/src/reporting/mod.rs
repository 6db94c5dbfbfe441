use fangjia_domain::entities::catalog::CityCatalog;
use fangjia_domain::entities::dataset::Dataset;
use fangjia_domain::repositories::report::ReportWriter;
use fangjia_domain::value_objects::weekly_point::WeeklySeries;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;
use std::time::Instant;

pub const DEFAULT_REPORT_FILE: &str = "house_price_report.html";

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemReportWriter;

impl FilesystemReportWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportWriter for FilesystemReportWriter {
    fn write_report(
        &self,
        path: &Path,
        dataset: &Dataset,
        synthetic: &WeeklySeries,
        catalog: &CityCatalog,
        generated_at: &str,
    ) -> Result<(), String> {
        let start = Instant::now();
        let result = write_report_html(path, dataset, synthetic, catalog, generated_at);
        let result_label = if result.is_ok() { "ok" } else { "err" };
        metrics::counter!("fangjia.infra.report.write.calls_total", "result" => result_label)
            .increment(1);
        metrics::histogram!("fangjia.infra.report.write_ms", "result" => result_label)
            .record(start.elapsed().as_millis() as f64);
        result
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// JSON safe to inline inside a `<script>` element.
pub fn script_json(value: &Value) -> Result<String, String> {
    let raw =
        serde_json::to_string(value).map_err(|err| format!("failed to serialize report data: {err}"))?;
    Ok(raw.replace("</", "<\\/"))
}

fn cities_value(catalog: &CityCatalog) -> Value {
    let mut cities = Map::new();
    for city in catalog.cities() {
        let names: Vec<&str> = city.districts.iter().map(|d| d.name.as_str()).collect();
        cities.insert(city.name.clone(), json!(names));
    }
    Value::Object(cities)
}

fn prices_value(dataset: &Dataset, catalog: &CityCatalog) -> Value {
    let mut cities = Map::new();
    for city in catalog.cities() {
        let mut districts = Map::new();
        for district in &city.districts {
            let mut records = dataset
                .get(&city.name, &district.name)
                .map(|series| series.monthly_data.clone())
                .unwrap_or_default();
            records.sort_by(|a, b| a.month.cmp(&b.month));
            let rows: Vec<Value> = records
                .iter()
                .map(|r| {
                    json!({
                        "month": r.month,
                        "second_hand_price": r.second_hand_price,
                        "new_house_price": r.new_house_price,
                    })
                })
                .collect();
            districts.insert(district.name.clone(), Value::Array(rows));
        }
        cities.insert(city.name.clone(), Value::Object(districts));
    }
    Value::Object(cities)
}

/// Weekly fallback points for catalog districts that have them.
fn synthetic_value(synthetic: &WeeklySeries, catalog: &CityCatalog) -> Value {
    let mut cities = Map::new();
    for city in catalog.cities() {
        let Some(generated) = synthetic.get(&city.name) else {
            continue;
        };
        let mut districts = Map::new();
        for district in &city.districts {
            let Some(points) = generated.get(&district.name) else {
                continue;
            };
            let rows: Vec<Value> = points
                .iter()
                .map(|p| {
                    json!({
                        "date": p.date,
                        "average_price": p.average_price,
                        "transaction_count": p.transaction_count,
                        "source": p.source,
                    })
                })
                .collect();
            districts.insert(district.name.clone(), Value::Array(rows));
        }
        cities.insert(city.name.clone(), Value::Object(districts));
    }
    Value::Object(cities)
}

fn options(values: &[&str], selected: Option<&str>) -> String {
    values
        .iter()
        .map(|value| {
            let flag = if Some(*value) == selected { " selected" } else { "" };
            let value = escape_html(value);
            format!(r#"<option value="{value}"{flag}>{value}</option>"#)
        })
        .collect::<Vec<_>>()
        .join("")
}

/// Live districts chart their monthly records; districts with no stored
/// records fall back to their synthetic weekly series when one is given.
pub fn render_report_html(
    dataset: &Dataset,
    synthetic: &WeeklySeries,
    catalog: &CityCatalog,
    generated_at: &str,
) -> Result<String, String> {
    let cities_json = script_json(&cities_value(catalog))?;
    let data_json = script_json(&prices_value(dataset, catalog))?;
    let synthetic_json = script_json(&synthetic_value(synthetic, catalog))?;

    let default_city = catalog.cities().first();
    let city_names: Vec<&str> = catalog.cities().iter().map(|c| c.name.as_str()).collect();
    let district_names: Vec<&str> = default_city
        .map(|c| c.districts.iter().map(|d| d.name.as_str()).collect())
        .unwrap_or_default();
    let city_options = options(&city_names, default_city.map(|c| c.name.as_str()));
    let district_options = options(&district_names, district_names.first().copied());
    let generated_at = escape_html(generated_at);

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
  <meta charset="UTF-8"/>
  <meta name="viewport" content="width=device-width, initial-scale=1.0"/>
  <title>中国主要城市房价趋势</title>
  <style>
    * {{ margin: 0; padding: 0; box-sizing: border-box; }}
    body {{ font-family: -apple-system, 'PingFang SC', 'Microsoft YaHei', Arial, sans-serif; color: #333; background: #f8f9fa; }}
    .container {{ max-width: 1200px; margin: 0 auto; padding: 20px; }}
    h1 {{ font-size: 28px; color: #2c3e50; margin-bottom: 20px; text-align: center; }}
    .meta {{ color: #666; font-size: 14px; margin-bottom: 20px; text-align: center; }}
    .source {{ background: #e8f4fd; border: 1px solid #b8daff; border-radius: 8px; padding: 15px; margin-bottom: 20px; text-align: center; }}
    .selectors {{ background: #fff; padding: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); margin-bottom: 20px; display: flex; gap: 20px; flex-wrap: wrap; }}
    .selector {{ display: flex; flex-direction: column; min-width: 120px; }}
    .selector label {{ margin-bottom: 8px; font-weight: 600; color: #34495e; }}
    .selector select {{ padding: 10px 15px; border: 1px solid #ddd; border-radius: 4px; font-size: 16px; }}
    #house-price-chart {{ width: 100%; height: 600px; }}
    @media (max-width: 768px) {{
      .selectors {{ flex-direction: column; }}
      #house-price-chart {{ height: 400px; }}
    }}
  </style>
  <script src="https://cdn.plot.ly/plotly-latest.min.js"></script>
</head>
<body>
  <div class="container">
    <h1>中国主要城市房价数据可视化</h1>
    <div class="meta">生成时间: {generated_at} | 数据更新周期: 每月 | 数据范围: 最近5年</div>
    <div class="source"><p>本报告数据基于聚汇数据平台公开信息。</p></div>
    <div class="selectors">
      <div class="selector">
        <label for="city-select">选择城市:</label>
        <select id="city-select">{city_options}</select>
      </div>
      <div class="selector">
        <label for="district-select">选择区域:</label>
        <select id="district-select">{district_options}</select>
      </div>
    </div>
    <div id="house-price-chart"></div>
  </div>
  <script>
    const citiesData = {cities_json};
    const housePriceData = {data_json};
    const syntheticData = {synthetic_json};
    const citySelect = document.getElementById('city-select');
    const districtSelect = document.getElementById('district-select');
    const chart = document.getElementById('house-price-chart');

    function updateChart(city, district) {{
      const rows = ((housePriceData[city] || {{}})[district] || []).slice();
      if (rows.length === 0) {{
        const weeks = (syntheticData[city] || {{}})[district] || [];
        if (weeks.length === 0) {{
          Plotly.newPlot(chart, [], {{ title: city + '-' + district + ' 暂无数据' }});
          return;
        }}
        Plotly.newPlot(chart, [{{
          type: 'scatter',
          mode: 'lines',
          name: '模拟周均价（元/平方米）',
          x: weeks.map(w => w.date),
          y: weeks.map(w => w.average_price),
          line: {{ color: '#999999', width: 2, dash: 'dot' }}
        }}], {{
          title: city + '-' + district + '房价走势图（模拟数据）',
          xaxis: {{ title: '日期', type: 'date', tickformat: '%Y年%m月', tickangle: -45, nticks: 12 }},
          yaxis: {{ title: '房价（元/㎡）', tickformat: '.0f' }},
          margin: {{ l: 80, r: 80, t: 80, b: 100 }},
          paper_bgcolor: 'transparent',
          plot_bgcolor: 'transparent'
        }});
        return;
      }}
      rows.sort((a, b) => a.month.localeCompare(b.month));
      const dates = rows.map(r => r.month + '-01');
      const traces = [{{
        type: 'scatter',
        mode: 'lines+markers',
        name: '二手房价格（元/平方米）',
        x: dates,
        y: rows.map(r => r.second_hand_price),
        line: {{ color: '#FF6384', width: 3 }},
        marker: {{ size: 8 }}
      }}];
      const newHouse = rows.map(r => (r.new_house_price === null || r.new_house_price === undefined) ? null : r.new_house_price);
      if (newHouse.some(v => v !== null)) {{
        traces.push({{
          type: 'scatter',
          mode: 'lines+markers',
          name: '新房价格（元/平方米）',
          x: dates,
          y: newHouse,
          connectgaps: false,
          line: {{ color: '#36A2EB', width: 3, dash: 'dash' }},
          marker: {{ size: 6, symbol: 'diamond' }}
        }});
      }}
      Plotly.newPlot(chart, traces, {{
        title: city + '-' + district + '房价走势图',
        xaxis: {{ title: '日期', type: 'date', tickformat: '%Y年%m月', tickangle: -45, nticks: 12 }},
        yaxis: {{ title: '房价（元/㎡）', tickformat: '.0f' }},
        legend: {{ orientation: 'h', yanchor: 'bottom', y: 1.02, xanchor: 'right', x: 1 }},
        margin: {{ l: 80, r: 80, t: 80, b: 100 }},
        paper_bgcolor: 'transparent',
        plot_bgcolor: 'transparent'
      }});
    }}

    function updateDistricts(city) {{
      districtSelect.innerHTML = '';
      const districts = citiesData[city] || [];
      for (const district of districts) {{
        const option = document.createElement('option');
        option.value = district;
        option.textContent = district;
        districtSelect.appendChild(option);
      }}
      if (districts.length > 0) {{
        updateChart(city, districts[0]);
      }}
    }}

    citySelect.addEventListener('change', () => updateDistricts(citySelect.value));
    districtSelect.addEventListener('change', () => updateChart(citySelect.value, districtSelect.value));
    window.addEventListener('resize', () => updateChart(citySelect.value, districtSelect.value));
    if (citySelect.value && districtSelect.value) {{
      updateChart(citySelect.value, districtSelect.value);
    }}
  </script>
</body>
</html>
"#
    ))
}

pub fn write_report_html(
    path: &Path,
    dataset: &Dataset,
    synthetic: &WeeklySeries,
    catalog: &CityCatalog,
    generated_at: &str,
) -> Result<(), String> {
    let html = render_report_html(dataset, synthetic, catalog, generated_at)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed to create dir {}: {}", parent.display(), err))?;
    }
    fs::write(path, html)
        .map_err(|err| format!("failed to write report {}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::{escape_html, render_report_html, script_json, write_report_html};
    use fangjia_domain::entities::catalog::CityCatalog;
    use fangjia_domain::entities::dataset::Dataset;
    use fangjia_domain::entities::district_series::DistrictSeries;
    use fangjia_domain::value_objects::monthly_record::MonthlyRecord;
    use fangjia_domain::value_objects::weekly_point::{WeeklyPoint, WeeklySeries};
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn dataset() -> Dataset {
        let mut dataset = Dataset::new();
        dataset.insert(
            "北京",
            "朝阳",
            DistrictSeries::from_records(
                vec![
                    MonthlyRecord::new("2025-09", 52040.0, Some(55894.0), "s"),
                    MonthlyRecord::new("2025-08", 51900.0, None, "s"),
                ],
                "聚汇数据-月度",
                "2025-10-18 09:30:00",
            ),
        );
        dataset
    }

    #[test]
    fn report_embeds_data_and_default_selection() {
        let html = render_report_html(
            &dataset(),
            &WeeklySeries::new(),
            &CityCatalog::builtin(),
            "2025年10月18日 09:30:00",
        )
        .expect("html");
        assert!(html.contains("cdn.plot.ly"));
        assert!(html.contains(r#"<option value="北京" selected>北京</option>"#));
        assert!(html.contains(r#"<option value="朝阳" selected>朝阳</option>"#));
        assert!(html.contains(r#""month":"2025-08""#));
        assert!(html.contains(r#""new_house_price":null"#));
        assert!(html.contains("生成时间: 2025年10月18日 09:30:00"));
        assert!(html.contains("const citiesData = {"));
        assert!(html.contains("const syntheticData = {};"));
    }

    #[test]
    fn districts_without_records_carry_their_synthetic_weeks() {
        let mut synthetic = WeeklySeries::new();
        synthetic.entry("北京".to_string()).or_default().insert(
            "海淀".to_string(),
            vec![WeeklyPoint {
                date: "2025-10-13".to_string(),
                average_price: 73_512.34,
                transaction_count: 97,
                source: "聚汇数据(模拟)".to_string(),
            }],
        );
        synthetic
            .entry("火星".to_string())
            .or_default()
            .insert("无名".to_string(), Vec::new());

        let html = render_report_html(&dataset(), &synthetic, &CityCatalog::builtin(), "now")
            .expect("html");
        assert!(html.contains(
            r#"const syntheticData = {"北京":{"海淀":[{"average_price":73512.34,"date":"2025-10-13","source":"聚汇数据(模拟)","transaction_count":97}]}};"#
        ));
        assert!(!html.contains("火星"));
        assert!(html.contains("（模拟数据）"));
    }

    #[test]
    fn inline_json_cannot_close_the_script_block() {
        let out = script_json(&json!({"x": "</script><script>alert(1)"})).expect("json");
        assert!(!out.contains("</script>"));
        assert_eq!(escape_html(r#"<a href="x">&"#), "&lt;a href=&quot;x&quot;&gt;&amp;");
    }

    #[test]
    fn write_creates_the_report_file() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!("fangjia_report_{}_{nanos}", std::process::id()));
        let path = dir.join("house_price_report.html");

        write_report_html(
            &path,
            &Dataset::new(),
            &WeeklySeries::new(),
            &CityCatalog::builtin(),
            "now",
        )
        .expect("write");
        let html = std::fs::read_to_string(&path).expect("read");
        assert!(html.starts_with("<!DOCTYPE html>"));
        let _ = std::fs::remove_dir_all(dir);
    }
}
