//! In-process doubles for the vector store and chat model seams.
#![allow(clippy::missing_docs_in_private_items)]

use std::{collections::HashMap, collections::VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    error::AppError,
    storage::{
        types::content_unit::{ContentUnit, ScoredUnit},
        vector::{ContentFilter, VectorStore},
    },
    utils::llm::{ChatModel, GenerationError},
};

const DEFAULT_MOCK_DISTANCE: f32 = 0.5;

/// Vector store over a plain list. Distances are fixed per unit id (0.5 unless set), so tests
/// control ranking exactly.
#[derive(Default)]
pub struct MockVectorStore {
    units: Mutex<Vec<ContentUnit>>,
    distances: Mutex<HashMap<String, f32>>,
    failing: bool,
    queried: Mutex<Vec<Option<ContentFilter>>>,
}

impl MockVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation errors.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub async fn insert(&self, unit: ContentUnit, distance: f32) {
        self.distances.lock().await.insert(unit.id.clone(), distance);
        let mut units = self.units.lock().await;
        units.retain(|u| u.id != unit.id);
        units.push(unit);
    }

    /// Filters passed to `query`, in call order.
    pub async fn queried_filters(&self) -> Vec<Option<ContentFilter>> {
        self.queried.lock().await.clone()
    }

    pub async fn units(&self) -> Vec<ContentUnit> {
        self.units.lock().await.clone()
    }

    fn check(&self) -> Result<(), AppError> {
        if self.failing {
            Err(AppError::InternalError("mock vector store unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl VectorStore for MockVectorStore {
    async fn upsert(&self, units: Vec<ContentUnit>) -> Result<(), AppError> {
        self.check()?;
        for unit in units {
            let distance = self
                .distances
                .lock()
                .await
                .get(&unit.id)
                .copied()
                .unwrap_or(DEFAULT_MOCK_DISTANCE);
            self.insert(unit, distance).await;
        }
        Ok(())
    }

    async fn delete(&self, filter: &ContentFilter) -> Result<usize, AppError> {
        self.check()?;
        if filter.is_empty() {
            return Err(AppError::Validation("empty filter".into()));
        }
        let mut units = self.units.lock().await;
        let before = units.len();
        units.retain(|u| !filter.matches(u));
        Ok(before.saturating_sub(units.len()))
    }

    async fn query(
        &self,
        _text: &str,
        top_k: usize,
        filter: Option<&ContentFilter>,
    ) -> Result<Vec<ScoredUnit>, AppError> {
        self.queried.lock().await.push(filter.cloned());
        self.check()?;

        let distances = self.distances.lock().await;
        let mut hits: Vec<ScoredUnit> = self
            .units
            .lock()
            .await
            .iter()
            .filter(|u| filter.is_none_or(|f| f.matches(u)))
            .map(|u| ScoredUnit {
                unit: u.clone(),
                distance: distances
                    .get(&u.id)
                    .copied()
                    .unwrap_or(DEFAULT_MOCK_DISTANCE),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self, filter: Option<&ContentFilter>) -> Result<usize, AppError> {
        self.check()?;
        Ok(self
            .units
            .lock()
            .await
            .iter()
            .filter(|u| filter.is_none_or(|f| f.matches(u)))
            .count())
    }

    async fn exists(&self, filter: &ContentFilter) -> Result<bool, AppError> {
        Ok(self.count(Some(filter)).await? > 0)
    }
}

/// Chat model that replays scripted outcomes and records every call.
pub struct MockChatModel {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    fallback: Result<String, GenerationError>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockChatModel {
    /// Always answers `reply`.
    pub fn replying(reply: &str) -> Self {
        Self::scripted(Vec::new(), Ok(reply.to_string()))
    }

    /// Always fails with `error`.
    pub fn failing(error: GenerationError) -> Self {
        Self::scripted(Vec::new(), Err(error))
    }

    /// Plays `script` in order, then keeps returning `then`.
    pub fn scripted(
        script: Vec<Result<String, GenerationError>>,
        then: Result<String, GenerationError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: then,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(system_prompt, user_message)` pairs received so far.
    pub async fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, GenerationError> {
        self.calls
            .lock()
            .await
            .push((system_prompt.to_string(), user_message.to_string()));
        let scripted = self.script.lock().await.pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}
