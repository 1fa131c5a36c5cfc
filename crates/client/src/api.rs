//! The storefront REST API as a trait, and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use cartwheel_core::api::{
    AddToCartRequest, AddToWishlistRequest, CartLineView, CheckoutResponse, ErrorBody,
    LoginRequest, OrderView, ProductList, ProductQuery, ProductView, RegisterRequest,
    SetQuantityRequest, TokenResponse, UserView, WishlistView,
};
use cartwheel_core::{OrderId, ProductId, Quantity};

use crate::error::ClientError;

/// Where the storefront lives and how long to wait for it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL without a trailing slash, e.g. `http://127.0.0.1:5000`.
    pub base_url: String,
    /// Per-request timeout. A mutation that exceeds it is reported as
    /// [`ClientError::OutcomeUnknown`].
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Calls the client makes against the storefront.
#[automock]
#[async_trait]
pub trait StorefrontApi: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> Result<TokenResponse, ClientError>;

    async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, ClientError>;

    async fn me(&self, token: &str) -> Result<UserView, ClientError>;

    async fn products(&self, query: &ProductQuery) -> Result<Vec<ProductView>, ClientError>;

    async fn product(&self, id: ProductId) -> Result<ProductView, ClientError>;

    async fn cart(&self, token: &str) -> Result<Vec<CartLineView>, ClientError>;

    /// Increment-or-insert a cart line.
    async fn add_to_cart(
        &self,
        token: &str,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Vec<CartLineView>, ClientError>;

    /// Set a line's quantity; below one removes it.
    async fn set_cart_quantity(
        &self,
        token: &str,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Vec<CartLineView>, ClientError>;

    async fn remove_from_cart(
        &self,
        token: &str,
        product_id: ProductId,
    ) -> Result<Vec<CartLineView>, ClientError>;

    async fn wishlist(&self, token: &str) -> Result<WishlistView, ClientError>;

    async fn add_to_wishlist(
        &self,
        token: &str,
        product_id: ProductId,
    ) -> Result<WishlistView, ClientError>;

    async fn remove_from_wishlist(
        &self,
        token: &str,
        product_id: ProductId,
    ) -> Result<WishlistView, ClientError>;

    async fn place_order(&self, token: &str) -> Result<CheckoutResponse, ClientError>;

    async fn orders(&self, token: &str) -> Result<Vec<OrderView>, ClientError>;

    async fn order(&self, token: &str, id: OrderId) -> Result<OrderView, ClientError>;
}

/// [`StorefrontApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct StorefrontClient {
    http: reqwest::Client,
    base_url: String,
}

impl StorefrontClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request and decode a success body, or turn the `{"msg"}` error
    /// body into a [`ClientError`].
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let msg = match response.json::<ErrorBody>().await {
            Ok(body) => body.msg,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string(),
        };
        tracing::debug!(status = status.as_u16(), %msg, "storefront request failed");

        if status == StatusCode::UNAUTHORIZED {
            Err(ClientError::Unauthorized(msg))
        } else {
            Err(ClientError::Api {
                status: status.as_u16(),
                msg,
            })
        }
    }
}

#[async_trait]
impl StorefrontApi for StorefrontClient {
    async fn register(&self, request: &RegisterRequest) -> Result<TokenResponse, ClientError> {
        self.send(self.http.post(self.url("/api/auth/register")).json(request))
            .await
    }

    async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, ClientError> {
        self.send(self.http.post(self.url("/api/auth/login")).json(request))
            .await
    }

    async fn me(&self, token: &str) -> Result<UserView, ClientError> {
        self.send(self.http.get(self.url("/api/auth/me")).bearer_auth(token))
            .await
    }

    async fn products(&self, query: &ProductQuery) -> Result<Vec<ProductView>, ClientError> {
        let path = match &query.category {
            Some(category) => format!("/api/products?category={}", urlencoding::encode(category)),
            None => "/api/products".to_string(),
        };
        let list: ProductList = self.send(self.http.get(self.url(&path))).await?;
        Ok(list.products)
    }

    async fn product(&self, id: ProductId) -> Result<ProductView, ClientError> {
        self.send(self.http.get(self.url(&format!("/api/products/{id}"))))
            .await
    }

    async fn cart(&self, token: &str) -> Result<Vec<CartLineView>, ClientError> {
        self.send(self.http.get(self.url("/api/cart")).bearer_auth(token))
            .await
    }

    async fn add_to_cart(
        &self,
        token: &str,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Vec<CartLineView>, ClientError> {
        let body = AddToCartRequest {
            product_id,
            quantity: i64::from(quantity.get()),
        };
        self.send(
            self.http
                .post(self.url("/api/cart"))
                .bearer_auth(token)
                .json(&body),
        )
        .await
    }

    async fn set_cart_quantity(
        &self,
        token: &str,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Vec<CartLineView>, ClientError> {
        self.send(
            self.http
                .put(self.url(&format!("/api/cart/{product_id}")))
                .bearer_auth(token)
                .json(&SetQuantityRequest { quantity }),
        )
        .await
    }

    async fn remove_from_cart(
        &self,
        token: &str,
        product_id: ProductId,
    ) -> Result<Vec<CartLineView>, ClientError> {
        self.send(
            self.http
                .delete(self.url(&format!("/api/cart/{product_id}")))
                .bearer_auth(token),
        )
        .await
    }

    async fn wishlist(&self, token: &str) -> Result<WishlistView, ClientError> {
        self.send(self.http.get(self.url("/api/wishlist")).bearer_auth(token))
            .await
    }

    async fn add_to_wishlist(
        &self,
        token: &str,
        product_id: ProductId,
    ) -> Result<WishlistView, ClientError> {
        self.send(
            self.http
                .post(self.url("/api/wishlist"))
                .bearer_auth(token)
                .json(&AddToWishlistRequest { product_id }),
        )
        .await
    }

    async fn remove_from_wishlist(
        &self,
        token: &str,
        product_id: ProductId,
    ) -> Result<WishlistView, ClientError> {
        self.send(
            self.http
                .delete(self.url(&format!("/api/wishlist/{product_id}")))
                .bearer_auth(token),
        )
        .await
    }

    async fn place_order(&self, token: &str) -> Result<CheckoutResponse, ClientError> {
        self.send(self.http.post(self.url("/api/orders")).bearer_auth(token))
            .await
    }

    async fn orders(&self, token: &str) -> Result<Vec<OrderView>, ClientError> {
        self.send(self.http.get(self.url("/api/orders")).bearer_auth(token))
            .await
    }

    async fn order(&self, token: &str, id: OrderId) -> Result<OrderView, ClientError> {
        self.send(
            self.http
                .get(self.url(&format!("/api/orders/{id}")))
                .bearer_auth(token),
        )
        .await
    }
}
