// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use reqwest::Method;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::ApiResult;
use crate::http::ApiClient;
use crate::models::{
    Bookmark, Category, CategoryList, LoginRequest, Movie, MovieList, MoviesPage, ProfileUpdate,
    RegisterData, Series, User,
};

/// Typed access to the movie platform's REST endpoints.
pub struct MovieApi {
    client: ApiClient,
}

impl MovieApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    // Auth

    /// Returns the raw login payload; identity fields sit at the top level
    /// next to the tokens.
    pub async fn login(&self, credentials: &LoginRequest) -> ApiResult<Value> {
        debug!("Logging in as {}", credentials.email);
        self.client
            .request(Method::POST, "/users/login", Some(serde_json::to_value(credentials)?))
            .await
    }

    pub async fn register(&self, data: &RegisterData) -> ApiResult<Value> {
        self.client
            .request(Method::POST, "/users/register", Some(serde_json::to_value(data)?))
            .await
    }

    pub async fn logout(&self) -> ApiResult<()> {
        self.client
            .request_empty(Method::DELETE, "/users/logout", None)
            .await
    }

    pub async fn current_user(&self) -> ApiResult<User> {
        self.client.request(Method::GET, "/users/me", None).await
    }

    pub async fn forgot_password(&self, email: &str) -> ApiResult<()> {
        self.client
            .request_empty(
                Method::POST,
                "/users/forgot-password",
                Some(json!({ "email": email })),
            )
            .await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> ApiResult<()> {
        self.client
            .request_empty(
                Method::PUT,
                "/users/reset-password",
                Some(json!({ "token": token, "newPassword": new_password })),
            )
            .await
    }

    pub async fn verify_email(&self, email: &str, token: &str) -> ApiResult<Value> {
        self.client
            .request(
                Method::PUT,
                "/users/verify",
                Some(json!({ "email": email, "token": token })),
            )
            .await
    }

    pub async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> ApiResult<User> {
        self.client
            .request(
                Method::PUT,
                &format!("/users/{}", user_id),
                Some(serde_json::to_value(update)?),
            )
            .await
    }

    // Catalog

    pub async fn categories(&self) -> ApiResult<Vec<Category>> {
        let list: CategoryList = self.client.public_request(Method::GET, "/category").await?;
        Ok(list.into_categories())
    }

    pub async fn movies_by_category(&self, category_id: &str) -> ApiResult<Vec<Movie>> {
        let list: MovieList = self
            .client
            .public_request(Method::GET, &format!("/category/{}/movies", category_id))
            .await?;
        Ok(list.into_movies())
    }

    pub async fn movies(&self, page: u32, items_per_page: u32) -> ApiResult<MoviesPage> {
        self.client
            .request(
                Method::GET,
                &format!("/movies?movie={}&itemsPerPage={}", page, items_per_page),
                None,
            )
            .await
    }

    pub async fn movie(&self, movie_id: &str) -> ApiResult<Movie> {
        self.client
            .request(Method::GET, &format!("/movies/{}", movie_id), None)
            .await
    }

    pub async fn search_movies(&self, query: &str) -> ApiResult<Vec<Movie>> {
        let list: MovieList = self
            .client
            .request(
                Method::GET,
                &format!("/movies/search?query={}", urlencoding::encode(query)),
                None,
            )
            .await?;
        Ok(list.into_movies())
    }

    pub async fn series(&self, series_id: &str) -> ApiResult<Series> {
        self.client
            .public_request(Method::GET, &format!("/series/{}", series_id))
            .await
    }

    pub async fn series_movies(&self, series_id: &str) -> ApiResult<Vec<Movie>> {
        let list: MovieList = self
            .client
            .public_request(Method::GET, &format!("/series/{}/movies", series_id))
            .await?;
        Ok(list.into_movies())
    }

    pub async fn all_series(&self, query: Option<&str>) -> ApiResult<Vec<Series>> {
        let path = match query {
            Some(q) => format!("/series?search={}", urlencoding::encode(q)),
            None => "/series".to_string(),
        };
        self.client.request(Method::GET, &path, None).await
    }

    // Bookmarks

    pub async fn bookmarks(&self, user_id: &str) -> ApiResult<Vec<Bookmark>> {
        self.client
            .request(Method::GET, &format!("/users/{}/favorites", user_id), None)
            .await
    }

    pub async fn add_bookmark(&self, user_id: &str, movie_id: &str) -> ApiResult<()> {
        self.client
            .request_empty(
                Method::POST,
                &format!("/users/{}/favorites", user_id),
                Some(json!({ "movieId": movie_id })),
            )
            .await
    }

    pub async fn remove_bookmark(&self, user_id: &str, movie_id: &str) -> ApiResult<()> {
        self.client
            .request_empty(
                Method::DELETE,
                &format!("/users/{}/favorites", user_id),
                Some(json!({ "movieId": movie_id })),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::models::ProfileUpdate;
    use crate::test_support::{ScriptedTransport, api_with};
    use serde_json::json;

    #[tokio::test]
    async fn categories_accept_wrapped_payload() {
        let transport = ScriptedTransport::new();
        transport.respond(
            "GET",
            "/category",
            200,
            json!({"categories": [{"_id": "c1", "name": "Action"}]}),
        );
        let (api, _) = api_with(&transport);

        let categories = api.categories().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "Action");
    }

    #[tokio::test]
    async fn search_query_is_url_encoded() {
        let transport = ScriptedTransport::new();
        transport.respond(
            "GET",
            "/movies/search?query=lord%20of%20the%20rings",
            200,
            json!([{"_id": "m1", "title": "The Fellowship of the Ring"}]),
        );
        let (api, _) = api_with(&transport);

        let movies = api.search_movies("lord of the rings").await.unwrap();
        assert_eq!(movies[0].id, "m1");
    }

    #[tokio::test]
    async fn bookmark_mutations_send_movie_id() {
        let transport = ScriptedTransport::new();
        transport.respond_raw("POST", "/users/u1/favorites", 201, "");
        let (api, _) = api_with(&transport);

        api.add_bookmark("u1", "m9").await.unwrap();
        assert_eq!(
            transport.last_body("/users/u1/favorites"),
            Some(json!({"movieId": "m9"}))
        );
    }

    #[tokio::test]
    async fn bookmark_failure_propagates() {
        let transport = ScriptedTransport::new();
        transport.respond("DELETE", "/users/u1/favorites", 500, json!({"message": "boom"}));
        let (api, _) = api_with(&transport);

        let err = api.remove_bookmark("u1", "m9").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn reset_password_uses_put() {
        let transport = ScriptedTransport::new();
        transport.respond_raw("PUT", "/users/reset-password", 200, "{}");
        let (api, _) = api_with(&transport);

        api.reset_password("tok", "n3w").await.unwrap();
        assert_eq!(
            transport.last_body("/users/reset-password"),
            Some(json!({"token": "tok", "newPassword": "n3w"}))
        );
    }

    #[tokio::test]
    async fn forgot_password_posts_email() {
        let transport = ScriptedTransport::new();
        transport.respond_raw("POST", "/users/forgot-password", 200, "{}");
        let (api, _) = api_with(&transport);

        api.forgot_password("ada@movie.hub").await.unwrap();
        assert_eq!(
            transport.last_body("/users/forgot-password"),
            Some(json!({"email": "ada@movie.hub"}))
        );
        assert_eq!(transport.total_calls(), 1);
    }

    #[tokio::test]
    async fn verify_email_uses_put() {
        let transport = ScriptedTransport::new();
        transport.respond("PUT", "/users/verify", 200, json!({"isActive": true}));
        let (api, _) = api_with(&transport);

        let response = api.verify_email("ada@movie.hub", "t0k").await.unwrap();
        assert_eq!(response["isActive"], json!(true));
        assert_eq!(
            transport.last_body("/users/verify"),
            Some(json!({"email": "ada@movie.hub", "token": "t0k"}))
        );
    }

    #[tokio::test]
    async fn profile_update_sends_only_changed_fields() {
        let transport = ScriptedTransport::new();
        transport.respond(
            "PUT",
            "/users/u1",
            200,
            json!({"_id": "u1", "email": "ada@movie.hub", "username": "ada"}),
        );
        let (api, _) = api_with(&transport);

        let update = ProfileUpdate {
            username: Some("ada".to_string()),
            ..ProfileUpdate::default()
        };
        let user = api.update_profile("u1", &update).await.unwrap();
        assert_eq!(user.username, "ada");
        assert_eq!(transport.last_body("/users/u1"), Some(json!({"username": "ada"})));
    }

    #[tokio::test]
    async fn movies_listing_passes_paging() {
        let transport = ScriptedTransport::new();
        transport.respond(
            "GET",
            "/movies?movie=2&itemsPerPage=10",
            200,
            json!({"movies": [{"_id": "m11", "title": "Ran"}], "totalMovies": 11}),
        );
        let (api, _) = api_with(&transport);

        let listing = api.movies(2, 10).await.unwrap();
        assert_eq!(listing.total_movies, 11);
        assert_eq!(listing.movies[0].id, "m11");
        assert_eq!(transport.total_calls(), 1);
    }

    #[tokio::test]
    async fn all_series_adds_encoded_search() {
        let transport = ScriptedTransport::new();
        transport.respond("GET", "/series", 200, json!([{"_id": "s1", "name": "Alien"}]));
        transport.respond(
            "GET",
            "/series?search=star%20wars",
            200,
            json!([{"_id": "s2", "title": "Star Wars"}]),
        );
        let (api, _) = api_with(&transport);

        assert_eq!(api.all_series(None).await.unwrap()[0].id, "s1");
        let found = api.all_series(Some("star wars")).await.unwrap();
        assert_eq!(found[0].name, "Star Wars");
        assert_eq!(transport.total_calls(), 2);
    }
}
