//! Mercado Pago REST client.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{is_payment_id, GatewayPayment, PaymentError, PaymentGateway, PaymentSession, SessionRequest};

#[derive(Clone, Debug)]
pub struct MercadoPagoClient {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
    site_url: String,
}

#[derive(Debug, Serialize)]
struct PreferenceBody<'a> {
    items: Vec<PreferenceItem<'a>>,
    external_reference: &'a str,
    notification_url: String,
    back_urls: BackUrls,
    auto_return: &'static str,
    payment_methods: PaymentMethods,
}

#[derive(Debug, Serialize)]
struct PreferenceItem<'a> {
    id: &'a str,
    title: &'a str,
    quantity: i32,
    unit_price: Decimal,
    currency_id: &'static str,
}

#[derive(Debug, Serialize)]
struct BackUrls { success: String, pending: String, failure: String }

#[derive(Debug, Serialize)]
struct PaymentMethods {
    excluded_payment_methods: Vec<Excluded>,
    excluded_payment_types: Vec<Excluded>,
}

#[derive(Debug, Serialize)]
struct Excluded { id: &'static str }

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: Option<String>,
    sandbox_init_point: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    status: Option<String>,
    external_reference: Option<String>,
    payment_method_id: Option<String>,
}

impl MercadoPagoClient {
    pub fn new(api_base: impl Into<String>, access_token: impl Into<String>, site_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            access_token: access_token.into(),
            site_url: site_url.into(),
        }
    }

    fn preference_body<'a>(&self, request: &'a SessionRequest) -> PreferenceBody<'a> {
        let confirmation = format!("{}/confirmacao?pedido={}", self.site_url, request.order_number);
        PreferenceBody {
            items: request.items.iter().map(|item| PreferenceItem {
                id: &item.id,
                title: &item.title,
                quantity: item.quantity,
                unit_price: item.unit_price,
                currency_id: "BRL",
            }).collect(),
            external_reference: &request.order_number,
            notification_url: format!("{}/webhooks/mercadopago", self.site_url),
            back_urls: BackUrls {
                success: confirmation.clone(),
                pending: confirmation,
                failure: format!("{}/checkout?erro=pagamento", self.site_url),
            },
            auto_return: "approved",
            payment_methods: PaymentMethods {
                excluded_payment_methods: vec![],
                excluded_payment_types: vec![Excluded { id: "ticket" }, Excluded { id: "atm" }],
            },
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Rejected { status: status.as_u16(), body });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    async fn create_payment_session(&self, request: &SessionRequest) -> Result<PaymentSession, PaymentError> {
        let response = self.http
            .post(format!("{}/checkout/preferences", self.api_base))
            .bearer_auth(&self.access_token)
            .json(&self.preference_body(request))
            .send()
            .await?;
        let preference: PreferenceResponse = Self::decode(response).await?;
        Ok(PaymentSession { id: preference.id, redirect_url: preference.init_point.or(preference.sandbox_init_point) })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, PaymentError> {
        if !is_payment_id(payment_id) {
            return Err(PaymentError::InvalidPaymentId(payment_id.to_string()));
        }
        let response = self.http
            .get(format!("{}/v1/payments/{}", self.api_base, payment_id))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let payment: PaymentResponse = Self::decode(response).await?;
        Ok(GatewayPayment {
            status: payment.status.unwrap_or_default(),
            external_reference: payment.external_reference.filter(|r| !r.is_empty()),
            method: payment.payment_method_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::SessionItem;

    #[test]
    fn test_preference_body_shape() {
        let client = MercadoPagoClient::new("https://api.example.com", "token", "https://loja.example.com");
        let request = SessionRequest {
            order_number: "TIT-1-001".into(),
            items: vec![SessionItem { id: "5".into(), title: "Creatina".into(), quantity: 2, unit_price: Decimal::new(8990, 2) }],
        };
        let body = serde_json::to_value(client.preference_body(&request)).unwrap();
        assert_eq!(body["external_reference"], "TIT-1-001");
        assert_eq!(body["notification_url"], "https://loja.example.com/webhooks/mercadopago");
        assert_eq!(body["back_urls"]["success"], "https://loja.example.com/confirmacao?pedido=TIT-1-001");
        assert_eq!(body["back_urls"]["failure"], "https://loja.example.com/checkout?erro=pagamento");
        assert_eq!(body["items"][0]["currency_id"], "BRL");
        assert_eq!(body["items"][0]["unit_price"], 89.9);
        assert_eq!(body["payment_methods"]["excluded_payment_types"][1]["id"], "atm");
    }

    #[test]
    fn test_payment_response_tolerates_missing_fields() {
        let payment: PaymentResponse = serde_json::from_str(r#"{"id": 123, "status": "approved"}"#).unwrap();
        assert_eq!(payment.status.as_deref(), Some("approved"));
        assert!(payment.external_reference.is_none());
    }

    #[tokio::test]
    async fn test_non_numeric_payment_id_is_not_requested() {
        let client = MercadoPagoClient::new("http://127.0.0.1:9", "token", "https://loja.example.com");
        let err = client.fetch_payment("../../users/me").await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidPaymentId(_)));
    }
}
