use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::collector::CollectedPayload;
use crate::enrichment::{ImageResolver, ImageSearch};
use crate::normalizer::{normalize, Normalized};
use crate::recipe::Recipe;
use crate::session::{Attempt, Superseded};

/// What the results view currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    /// One skeleton card per pending recipe.
    Loading { pending: usize },
    /// The fully enriched list. Never published partially.
    Populated(Arc<Vec<Recipe>>),
    Empty,
}

impl ViewState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAction {
    BackToHome,
    Home,
    Regenerate,
}

impl ViewAction {
    pub fn label(self) -> &'static str {
        match self {
            ViewAction::BackToHome => "Back to Home",
            ViewAction::Home => "Home",
            ViewAction::Regenerate => "Regenerate",
        }
    }
}

/// Owns the recipe list and loading flag for one attempt's results.
#[derive(Debug)]
pub struct ResultsView {
    state: watch::Sender<ViewState>,
    normalized: Vec<Recipe>,
    manual_ingredients: Vec<String>,
    attempt: Attempt,
    enriching: AtomicBool,
}

impl ResultsView {
    pub fn open(payload: &CollectedPayload, attempt: Attempt) -> Self {
        let ingredients = payload.manual_ingredients().to_vec();
        match normalize(payload.records()) {
            Normalized::Empty => Self::empty(ingredients, attempt),
            Normalized::Recipes(recipes) => {
                let (state, _) = watch::channel(ViewState::Loading {
                    pending: recipes.len(),
                });
                Self {
                    state,
                    normalized: recipes,
                    manual_ingredients: ingredients,
                    attempt,
                    enriching: AtomicBool::new(false),
                }
            }
        }
    }

    pub fn empty(manual_ingredients: Vec<String>, attempt: Attempt) -> Self {
        let (state, _) = watch::channel(ViewState::Empty);
        Self {
            state,
            normalized: Vec::new(),
            manual_ingredients,
            attempt,
            enriching: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn attempt_id(&self) -> u64 {
        self.attempt.id()
    }

    pub fn manual_ingredients(&self) -> &[String] {
        &self.manual_ingredients
    }

    pub fn actions(&self) -> &'static [ViewAction] {
        match *self.state.borrow() {
            ViewState::Empty => &[ViewAction::BackToHome],
            _ => &[ViewAction::Home, ViewAction::Regenerate],
        }
    }

    /// Resolves missing images and publishes the enriched list in one step.
    /// Only the first call does any work; later or concurrent calls, and calls
    /// on an empty view, return at once. Fails when a newer attempt has begun,
    /// leaving this view in its loading state.
    pub async fn enrich<S: ImageSearch>(&self, resolver: &ImageResolver<S>) -> Result<(), Superseded> {
        if !self.is_loading() || self.enriching.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let enriched = self.attempt.guard(resolver.enrich(&self.normalized)).await?;
        if !self.attempt.is_current() {
            return Err(Superseded(self.attempt.id()));
        }
        info!(attempt = self.attempt.id(), recipes = enriched.len(), "results ready");
        self.state.send_replace(ViewState::Populated(Arc::new(enriched)));
        Ok(())
    }
}
