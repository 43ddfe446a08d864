//! Chunked, retrying categorization of flat bookmark lists
//!
//! Links go to the completion service five at a time, strictly one request in
//! flight. Each request is retried on transient faults with a growing delay,
//! and the run pauses after every third chunk to stay under rate limits. Any
//! failed chunk aborts the whole run; nothing partial is returned.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ai_client::CompletionService;
use crate::error::OrganizeError;
use crate::model::{CategorizedRecord, FlatLinkRecord};
use crate::utils::safe_truncate;

/// Links per categorization request
pub const CHUNK_SIZE: usize = 5;

const PREVIEW_BYTES: usize = 200;

/// How results inside one chunk are ordered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkOrder {
    /// Keep whatever order the service answered in
    #[default]
    AsReturned,
    /// Re-sort each chunk's results back to the order the links were sent in
    Input,
}

/// Switches that shape both the prompt and the regrouping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizeOptions {
    /// One folder level (category only) instead of category/sub-category
    pub use_simple_categories: bool,
    /// Ask the service to tidy titles, and trim them when grouping
    pub clean_titles: bool,
    pub chunk_order: ChunkOrder,
}

/// Retry schedule for a single chunk request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

/// Pause inserted between chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Pause after every `every` chunks (never after the last one)
    pub every: usize,
    pub pause: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            every: 3,
            pause: Duration::from_millis(2000),
        }
    }
}

/// Timer used for backoff and pacing
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Shared cancellation switch, checked between requests
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), OrganizeError> {
        if self.is_cancelled() {
            Err(OrganizeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Categorization client over any completion service
pub struct Categorizer<C, S = TokioSleeper> {
    service: C,
    sleeper: S,
    retry: RetryPolicy,
    pacing: Pacing,
}

impl<C: CompletionService> Categorizer<C> {
    pub fn new(service: C) -> Self {
        Self {
            service,
            sleeper: TokioSleeper,
            retry: RetryPolicy::default(),
            pacing: Pacing::default(),
        }
    }
}

impl<C: CompletionService, S: Sleeper> Categorizer<C, S> {
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> Categorizer<C, S2> {
        Categorizer {
            service: self.service,
            sleeper,
            retry: self.retry,
            pacing: self.pacing,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Categorize every link, chunk by chunk, in order.
    ///
    /// Empty input fails with `EmptyInput` without touching the service.
    pub async fn categorize(
        &self,
        links: &[FlatLinkRecord],
        options: &OrganizeOptions,
        cancel: &CancelFlag,
    ) -> Result<Vec<CategorizedRecord>, OrganizeError> {
        if links.is_empty() {
            return Err(OrganizeError::EmptyInput);
        }

        let total = links.len().div_ceil(CHUNK_SIZE);
        info!("[Categorize] {} bookmarks in {} chunks of up to {}", links.len(), total, CHUNK_SIZE);

        let mut categorized = Vec::with_capacity(links.len());
        for (index, chunk) in links.chunks(CHUNK_SIZE).enumerate() {
            cancel.check()?;

            debug!("[Categorize] Chunk {}/{}", index + 1, total);
            let prompt = build_prompt(chunk, options);
            let text = self.request_with_retry(&prompt, index, cancel).await?;

            let mut records = parse_chunk_response(&text, index)?;
            if options.chunk_order == ChunkOrder::Input {
                restore_input_order(&mut records, chunk);
            }
            debug!("[Categorize] Chunk {} returned {} records", index + 1, records.len());
            categorized.extend(records);

            let done = index + 1;
            if self.pacing.every > 0 && done % self.pacing.every == 0 && done < total {
                info!("[Categorize] Pausing {}ms to stay under the rate limit", self.pacing.pause.as_millis());
                self.sleeper.sleep(self.pacing.pause).await;
            }
        }

        info!("[Categorize] Done: {} records", categorized.len());
        Ok(categorized)
    }

    /// One chunk request with bounded retries.
    ///
    /// The delay starts at `initial_delay`; an overload signal doubles it, and
    /// the grown delay carries over to later retries.
    async fn request_with_retry(
        &self,
        prompt: &str,
        chunk: usize,
        cancel: &CancelFlag,
    ) -> Result<String, OrganizeError> {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match self.service.complete(prompt).await {
                Ok(text) => return Ok(text),
                Err(err) => err,
            };

            if !err.is_retryable() {
                warn!("[Categorize] Chunk {} rejected: {}", chunk + 1, err);
                return Err(OrganizeError::ServiceRejected(err));
            }
            if attempt > self.retry.max_retries {
                warn!("[Categorize] Chunk {} failed after {} attempts: {}", chunk + 1, attempt, err);
                return Err(OrganizeError::ServiceUnavailable {
                    attempts: attempt,
                    source: err,
                });
            }

            let wait = if err.is_overload() { delay * 2 } else { delay };
            warn!(
                "[Categorize] Chunk {} attempt {} failed ({}); {} retries left, waiting {}ms",
                chunk + 1,
                attempt,
                err,
                self.retry.max_retries + 1 - attempt,
                wait.as_millis()
            );
            self.sleeper.sleep(wait).await;
            delay = wait;
            cancel.check()?;
        }
    }
}

/// Instruction sent for one chunk; the chunk itself is appended as JSON
pub fn build_prompt(chunk: &[FlatLinkRecord], options: &OrganizeOptions) -> String {
    let mut prompt = String::new();

    if options.use_simple_categories {
        prompt.push_str("Analyze the bookmarks below and suggest the single most fitting main category for each one.\n");
    } else {
        prompt.push_str("Analyze the bookmarks below and suggest the most fitting category and sub-category for each one.\n");
    }
    if options.clean_titles {
        prompt.push_str(
            "Also make each title shorter and easier to read: remove trailing site or channel names and repeated phrases.\n",
        );
    }

    prompt.push_str("\nFor every bookmark return a JSON object with these fields:\n");
    if options.clean_titles {
        prompt.push_str("- title: the cleaned-up title, without suffixes or repetition\n");
    } else {
        prompt.push_str("- title: the bookmark's title, unchanged\n");
    }
    prompt.push_str("- url: the bookmark's URL, unchanged\n");
    prompt.push_str("- category: main category (for example \"Development\", \"Social Media\", \"Shopping\")\n");
    if !options.use_simple_categories {
        prompt.push_str("- subCategory: sub-category (for example \"JavaScript\", \"Frontend\", \"E-commerce\")\n");
    }

    if options.clean_titles {
        prompt.push_str(
            "\nTitle clean-up examples:\n\
             - \"Fine Tuning GPT-3.5-Turbo - Comprehensive Guide with Code Walkthrough - YouTube\" -> \"Fine Tuning GPT-3.5-Turbo\"\n\
             - \"Forget ChatGPT, Try These 7 Free AI Tools! - YouTube\" -> \"7 Free AI Tools\"\n",
        );
    }
    if options.use_simple_categories {
        prompt.push_str(
            "\nKeep categories broad and do not split them into sub-categories. \
             For example, use \"Artificial Intelligence\" rather than \"Computer Vision\" or \"Natural Language Processing\".\n",
        );
    }

    prompt.push_str("\nRespond with a JSON array only. Do not add any explanation.\n\nBookmarks:\n");
    // Serializing plain strings cannot fail
    prompt.push_str(&serde_json::to_string_pretty(chunk).unwrap_or_default());
    prompt
}

fn code_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?i)```(?:json)?\n?").expect("code fence pattern is valid"))
}

/// Pull the JSON array out of a completion.
///
/// Code fences are stripped, then everything from the first `[` to the last
/// `]` is parsed. Failures are format errors and are never retried.
pub fn parse_chunk_response(text: &str, chunk: usize) -> Result<Vec<CategorizedRecord>, OrganizeError> {
    let cleaned = code_fence().replace_all(text, "");
    let cleaned = cleaned.trim();

    let format_error = |reason: String| OrganizeError::ResponseFormat {
        chunk: chunk + 1,
        reason,
        preview: safe_truncate(text, PREVIEW_BYTES).to_string(),
    };

    let (Some(start), Some(end)) = (cleaned.find('['), cleaned.rfind(']')) else {
        return Err(format_error("no JSON array found".to_string()));
    };
    if end < start {
        return Err(format_error("no JSON array found".to_string()));
    }

    serde_json::from_str::<Vec<CategorizedRecord>>(&cleaned[start..=end]).map_err(|e| format_error(e.to_string()))
}

/// Stable sort by each record's URL position in the request; unknown URLs go last
fn restore_input_order(records: &mut [CategorizedRecord], chunk: &[FlatLinkRecord]) {
    records.sort_by_key(|record| {
        chunk
            .iter()
            .position(|link| link.url == record.url)
            .unwrap_or(usize::MAX)
    });
}
