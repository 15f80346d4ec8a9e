//! Canvas REST API client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use quizrank_core::model::{Member, Profile, QuizMeta, RemoteCourse, Submission};
use quizrank_core::traits::LmsClient;

use crate::error::{decode_error, transport_error, ApiError};
use crate::http::{check_response, next_link};

pub const DEFAULT_PER_PAGE: u32 = 100;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Pages followed for one listing before giving up.
pub const MAX_PAGES: u32 = 1000;

/// Canvas LMS API client authenticated with a bearer token.
pub struct CanvasClient {
    base_url: Url,
    access_token: String,
    per_page: u32,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl std::fmt::Debug for CanvasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasClient")
            .field("base_url", &self.base_url.as_str())
            .field("access_token", &"***")
            .field("per_page", &self.per_page)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl CanvasClient {
    pub fn new(base_url: &str, access_token: &str) -> Result<Self, ApiError> {
        Self::with_options(base_url, access_token, DEFAULT_PER_PAGE, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_options(
        base_url: &str,
        access_token: &str,
        per_page: u32,
        timeout_secs: u64,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Setup(format!("invalid base URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Setup(format!("base URL '{base_url}' cannot carry a path")));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ApiError::Setup(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            access_token: access_token.to_string(),
            per_page: per_page.clamp(1, 100),
            timeout_secs,
            client,
        })
    }

    /// `{base}/api/v1/{segments...}`, each segment percent-encoded.
    fn endpoint_url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["api", "v1"]).extend(segments);
        }
        url
    }

    fn paged_url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint_url(segments);
        url.query_pairs_mut()
            .append_pair("per_page", &self.per_page.to_string());
        url
    }

    async fn get(&self, endpoint: &str, url: Url) -> Result<reqwest::Response, ApiError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| transport_error(endpoint, self.timeout_secs, e))?;
        check_response(endpoint, response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, url: Url) -> Result<T, ApiError> {
        let response = self.get(endpoint, url).await?;
        response.json::<T>().await.map_err(|e| decode_error(endpoint, e))
    }

    /// Fetch every page of a listing, following `rel="next"` links until
    /// the server stops sending one.
    async fn get_paginated<P: DeserializeOwned>(
        &self,
        endpoint: &str,
        first: Url,
    ) -> Result<Vec<P>, ApiError> {
        let mut pages = Vec::new();
        let mut url = first;
        loop {
            if pages.len() as u32 >= MAX_PAGES {
                return Err(ApiError::Pagination {
                    endpoint: endpoint.to_string(),
                    pages: MAX_PAGES,
                });
            }

            let response = self.get(endpoint, url.clone()).await?;
            let next = next_link(response.headers());
            let page = response
                .json::<P>()
                .await
                .map_err(|e| decode_error(endpoint, e))?;
            pages.push(page);

            match next {
                Some(link) => {
                    let next_url = url
                        .join(&link)
                        .map_err(|e| decode_error(endpoint, format!("bad next link '{link}': {e}")))?;
                    // The bearer token goes with every page.
                    if next_url.origin() != self.base_url.origin() {
                        return Err(decode_error(
                            endpoint,
                            format!("next link '{link}' points outside {}", self.base_url),
                        ));
                    }
                    url = next_url;
                    debug!(endpoint, page = pages.len() + 1, "following next page");
                }
                None => break,
            }
        }
        Ok(pages)
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CanvasCourse {
    id: u64,
    #[serde(default)]
    name: Option<String>,
}

impl From<CanvasCourse> for RemoteCourse {
    fn from(c: CanvasCourse) -> Self {
        RemoteCourse {
            id: c.id.to_string(),
            name: c.name.unwrap_or_else(|| format!("Course {}", c.id)),
        }
    }
}

#[derive(Deserialize)]
struct CanvasUser {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
}

#[derive(Deserialize)]
struct CanvasQuiz {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    points_possible: Option<f64>,
}

#[derive(Deserialize)]
struct SubmissionsPage {
    #[serde(default)]
    quiz_submissions: Vec<CanvasSubmission>,
}

#[derive(Deserialize)]
struct CanvasSubmission {
    id: u64,
    quiz_id: u64,
    user_id: u64,
    #[serde(default)]
    workflow_state: String,
    #[serde(default)]
    finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    quiz_points_possible: Option<f64>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl From<CanvasSubmission> for Submission {
    fn from(s: CanvasSubmission) -> Self {
        Submission {
            id: s.id.to_string(),
            quiz_id: s.quiz_id.to_string(),
            user_id: s.user_id.to_string(),
            workflow_state: s.workflow_state,
            finished_at: s.finished_at,
            score: s.score,
            quiz_points_possible: s.quiz_points_possible,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Deserialize)]
struct CanvasProfile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
}

#[async_trait]
impl LmsClient for CanvasClient {
    fn name(&self) -> &str {
        "canvas"
    }

    #[instrument(skip(self))]
    async fn fetch_courses(&self) -> Result<Vec<RemoteCourse>, ApiError> {
        let pages: Vec<Vec<CanvasCourse>> = self
            .get_paginated("courses", self.paged_url(&["courses"]))
            .await?;
        Ok(pages.into_iter().flatten().map(RemoteCourse::from).collect())
    }

    #[instrument(skip(self))]
    async fn fetch_course(&self, course_id: &str) -> Result<RemoteCourse, ApiError> {
        let endpoint = format!("courses/{course_id}");
        let course: CanvasCourse = self
            .get_json(&endpoint, self.endpoint_url(&["courses", course_id]))
            .await?;
        Ok(course.into())
    }

    #[instrument(skip(self))]
    async fn fetch_course_members(&self, course_id: &str) -> Result<Vec<Member>, ApiError> {
        let endpoint = format!("courses/{course_id}/users");
        let mut url = self.paged_url(&["courses", course_id, "users"]);
        url.query_pairs_mut()
            .append_pair("enrollment_type[]", "student");
        let pages: Vec<Vec<CanvasUser>> = self.get_paginated(&endpoint, url).await?;
        Ok(pages
            .into_iter()
            .flatten()
            .map(|u| Member {
                user_id: u.id.to_string(),
                name: u.name.unwrap_or_default(),
                short_name: u.short_name.unwrap_or_default(),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn fetch_quizzes(&self, course_id: &str) -> Result<Vec<QuizMeta>, ApiError> {
        let endpoint = format!("courses/{course_id}/quizzes");
        let pages: Vec<Vec<CanvasQuiz>> = self
            .get_paginated(&endpoint, self.paged_url(&["courses", course_id, "quizzes"]))
            .await?;
        Ok(pages
            .into_iter()
            .flatten()
            .map(|q| QuizMeta {
                id: q.id.to_string(),
                title: q.title,
                points_possible: q.points_possible,
            })
            .collect())
    }

    #[instrument(skip(self), fields(since = %since))]
    async fn fetch_submissions_since(
        &self,
        course_id: &str,
        quiz_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Submission>, ApiError> {
        let endpoint = format!("courses/{course_id}/quizzes/{quiz_id}/submissions");
        let mut url = self.paged_url(&["courses", course_id, "quizzes", quiz_id, "submissions"]);
        url.query_pairs_mut().append_pair(
            "updated_since",
            &since.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        let pages: Vec<SubmissionsPage> = self.get_paginated(&endpoint, url).await?;
        Ok(pages
            .into_iter()
            .flat_map(|p| p.quiz_submissions)
            .map(Submission::from)
            .collect())
    }

    #[instrument(skip(self))]
    async fn fetch_user_profile(&self, user_id: &str) -> Result<Profile, ApiError> {
        let endpoint = format!("users/{user_id}/profile");
        let profile: CanvasProfile = self
            .get_json(&endpoint, self.endpoint_url(&["users", user_id, "profile"]))
            .await?;
        Ok(Profile {
            name: profile.name.unwrap_or_default(),
            short_name: profile.short_name.unwrap_or_default(),
        })
    }
}
