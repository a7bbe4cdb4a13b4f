use reqwest::Method;
use serde_json::Value;

use crate::transport::HttpRequest;

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Form(Vec<(String, String)>),
    Json(Value),
}

/// 거래소 호출 하나를 표현하는 요청. 서명 전에는 헤더가 비어 있고,
/// `Signer` 가 쿼리/폼/헤더에 인증 정보를 채워 넣는다.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Body,
    pub headers: Vec<(String, String)>,
    /// 인증이 필요한 호출인지
    pub private: bool,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: Body::Empty,
            headers: Vec::new(),
            private: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn signed(mut self) -> Self {
        self.private = true;
        self
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn form(mut self, key: &str, value: impl Into<String>) -> Self {
        let entry = (key.to_string(), value.into());
        match &mut self.body {
            Body::Form(fields) => fields.push(entry),
            _ => self.body = Body::Form(vec![entry]),
        }
        self
    }

    pub fn json(mut self, value: Value) -> Self {
        self.body = Body::Json(value);
        self
    }

    pub fn set_header(&mut self, key: &str, value: impl Into<String>) {
        self.headers.push((key.to_string(), value.into()));
    }

    /// 서명 대상 파라미터를 요청에 추가한다. 폼 바디가 있으면 폼에, 없으면 쿼리에.
    pub fn push_param(&mut self, key: &str, value: impl Into<String>) {
        let entry = (key.to_string(), value.into());
        match &mut self.body {
            Body::Form(fields) => fields.push(entry),
            _ => self.query.push(entry),
        }
    }

    /// 서명에 쓰이는 파라미터 목록 (쿼리 + 폼, 또는 JSON 최상위 필드)
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = self.query.clone();
        match &self.body {
            Body::Empty => {}
            Body::Form(fields) => params.extend(fields.iter().cloned()),
            Body::Json(Value::Object(map)) => {
                for (key, value) in map {
                    let text = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    params.push((key.clone(), text));
                }
            }
            Body::Json(_) => {}
        }
        params
    }

    /// URL 인코딩된 쿼리 문자열 (순서 유지)
    pub fn query_string(&self) -> String {
        encode_pairs(&self.query)
    }

    pub fn path_with_query(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query_string())
        }
    }

    pub fn body_string(&self) -> String {
        match &self.body {
            Body::Empty => String::new(),
            Body::Form(fields) => encode_pairs(fields),
            Body::Json(value) => value.to_string(),
        }
    }

    pub fn content_type(&self) -> Option<&'static str> {
        match &self.body {
            Body::Empty => None,
            Body::Form(_) => Some("application/x-www-form-urlencoded"),
            Body::Json(_) => Some("application/json"),
        }
    }

    pub fn into_http(self, base_url: &str) -> HttpRequest {
        let url = format!("{}{}", base_url.trim_end_matches('/'), self.path_with_query());
        let mut headers = self.headers.clone();
        if let Some(content_type) = self.content_type() {
            headers.push(("Content-Type".to_string(), content_type.to_string()));
        }
        let body = match self.body {
            Body::Empty => None,
            _ => Some(self.body_string()),
        };

        HttpRequest {
            method: self.method,
            url,
            headers,
            body,
        }
    }
}

pub fn encode_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_string_keeps_order_and_escapes() {
        let request = Request::get("/api/v3/depth")
            .query("symbol", "BTCUSDT")
            .query("note", "a b&c");
        assert_eq!(request.query_string(), "symbol=BTCUSDT&note=a%20b%26c");
        assert_eq!(
            request.path_with_query(),
            "/api/v3/depth?symbol=BTCUSDT&note=a%20b%26c"
        );
    }

    #[test]
    fn test_push_param_targets_form_when_present() {
        let mut request = Request::post("/v2/supplement/create_order.do").form("symbol", "btc_usdt");
        request.push_param("api_key", "k");
        assert!(request.query.is_empty());
        assert_eq!(request.body_string(), "symbol=btc_usdt&api_key=k");

        let mut request = Request::get("/api/v3/account");
        request.push_param("timestamp", "1");
        assert_eq!(request.query_string(), "timestamp=1");
    }

    #[test]
    fn test_json_params_are_flattened() {
        let request = Request::post("/v1/orders").json(json!({
            "market": "KRW-BTC",
            "volume": "0.001",
        }));
        let params = request.params();
        assert!(params.contains(&("market".to_string(), "KRW-BTC".to_string())));
        assert!(params.contains(&("volume".to_string(), "0.001".to_string())));
    }

    #[test]
    fn test_into_http_sets_content_type() {
        let http = Request::post("/api/v5/trade/order")
            .json(json!({"instId": "BTC-USDT"}))
            .into_http("https://www.okx.com/");
        assert_eq!(http.url, "https://www.okx.com/api/v5/trade/order");
        assert_eq!(http.body.as_deref(), Some(r#"{"instId":"BTC-USDT"}"#));
        assert!(http
            .headers
            .iter()
            .any(|(k, v)| k == "Content-Type" && v == "application/json"));
    }
}
