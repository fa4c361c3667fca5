//! 认证模式与GCP服务账号身份令牌客户端
//!
//! 配置了服务账号密钥时，每个请求都会附带由该密钥换取的身份令牌。

use crate::config::GrafanaOptions;
use crate::error::NotificationError;
use crate::notification::transport::build_client;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

/// Google OAuth2 令牌接口
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// JWT bearer 授权类型
const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// 断言有效期（秒）
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// 认证模式
///
/// 每次发送时根据配置重新判定，两种模式互斥。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// 仅使用静态 API Key
    StaticBearer,
    /// 使用GCP服务账号身份令牌（IAP），同时保留静态 API Key
    ServiceAccountIdentity,
}

impl AuthMode {
    /// 根据配置判定认证模式
    pub fn resolve(options: &GrafanaOptions) -> Self {
        if options.gcp_sa_key.is_empty() {
            AuthMode::StaticBearer
        } else {
            AuthMode::ServiceAccountIdentity
        }
    }
}

/// GCP服务账号密钥
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// 密钥类型，必须为 service_account
    #[serde(rename = "type")]
    pub key_type: String,
    /// 服务账号邮箱
    pub client_email: String,
    /// PEM格式RSA私钥
    pub private_key: String,
    /// 私钥ID
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// 令牌接口
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// 解析JSON格式的服务账号密钥
    pub fn from_json(key_json: &str) -> Result<Self, NotificationError> {
        let key: ServiceAccountKey = serde_json::from_str(key_json)
            .map_err(|e| NotificationError::AuthSetup(format!("服务账号密钥解析失败: {}", e)))?;

        if key.key_type != "service_account" {
            return Err(NotificationError::AuthSetup(format!(
                "不支持的凭证类型: {}",
                key.key_type
            )));
        }

        if key.client_email.trim().is_empty() {
            return Err(NotificationError::AuthSetup(
                "服务账号密钥缺少 client_email".to_string(),
            ));
        }

        if key.private_key.trim().is_empty() {
            return Err(NotificationError::AuthSetup(
                "服务账号密钥缺少 private_key".to_string(),
            ));
        }

        Ok(key)
    }

    /// 令牌接口地址
    pub fn token_uri(&self) -> &str {
        self.token_uri
            .as_deref()
            .filter(|uri| !uri.is_empty())
            .unwrap_or(DEFAULT_TOKEN_URI)
    }
}

/// 身份令牌断言声明
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// 签发者，服务账号邮箱
    pub iss: String,
    /// 主体，服务账号邮箱
    pub sub: String,
    /// 令牌接口地址
    pub aud: String,
    /// 身份令牌的目标受众
    pub target_audience: String,
    /// 签发时间（秒）
    pub iat: i64,
    /// 过期时间（秒）
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

/// 自动附加身份令牌的HTTP客户端
///
/// 令牌放在 `Proxy-Authorization` 头中，`Authorization` 头保留给Grafana的API Key。
/// 换取令牌使用独立的HTTP客户端，始终校验TLS证书，不受 insecureSkipVerify 影响。
pub struct IdentityTokenClient {
    key: ServiceAccountKey,
    client: Client,
    insecure_skip_verify: bool,
    encoding_key: EncodingKey,
    audience: String,
}

impl std::fmt::Debug for IdentityTokenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityTokenClient")
            .field("client_email", &self.key.client_email)
            .field("audience", &self.audience)
            .finish()
    }
}

impl IdentityTokenClient {
    /// 由服务账号密钥创建客户端
    ///
    /// # 参数
    /// * `key_json` - JSON格式的服务账号密钥
    /// * `audience` - 身份令牌的目标受众
    ///
    /// # 返回
    /// * `Result<Self, NotificationError>` - 密钥无效时返回 AuthSetup 错误
    pub fn new(key_json: &str, audience: impl Into<String>) -> Result<Self, NotificationError> {
        let key = ServiceAccountKey::from_json(key_json)?;
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| NotificationError::AuthSetup(format!("私钥无效: {}", e)))?;

        let insecure_skip_verify = false;
        let client = build_client(insecure_skip_verify)
            .map_err(|e| NotificationError::AuthSetup(format!("创建令牌HTTP客户端失败: {}", e)))?;

        Ok(Self {
            key,
            client,
            insecure_skip_verify,
            encoding_key,
            audience: audience.into(),
        })
    }

    /// 目标受众
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// 换取令牌时是否校验TLS证书
    pub fn verifies_certificates(&self) -> bool {
        !self.insecure_skip_verify
    }

    /// 生成签名的JWT断言
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String, NotificationError> {
        let iat = now.timestamp();
        let claims = IdentityClaims {
            iss: self.key.client_email.clone(),
            sub: self.key.client_email.clone(),
            aud: self.key.token_uri().to_string(),
            target_audience: self.audience.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| NotificationError::IdentityToken(format!("JWT签名失败: {}", e)))
    }

    /// 用JWT断言换取身份令牌
    pub async fn fetch_token(&self) -> Result<String, NotificationError> {
        let assertion = self.assertion(Utc::now())?;

        let response = self
            .client
            .post(self.key.token_uri())
            .form(&[
                ("grant_type", JWT_BEARER_GRANT_TYPE),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| NotificationError::IdentityToken(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NotificationError::IdentityToken(e.to_string()))?;

        if !status.is_success() {
            return Err(NotificationError::IdentityToken(format!(
                "{} 返回状态码 {}: {}",
                self.key.token_uri(),
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| NotificationError::IdentityToken(format!("令牌响应解析失败: {}", e)))?;

        token
            .id_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| NotificationError::IdentityToken("令牌响应缺少 id_token".to_string()))
    }

    /// 为请求附加身份令牌
    pub async fn authorize(
        &self,
        request: RequestBuilder,
    ) -> Result<RequestBuilder, NotificationError> {
        let token = self.fetch_token().await?;
        Ok(request.header(
            reqwest::header::PROXY_AUTHORIZATION,
            format!("Bearer {}", token),
        ))
    }
}
