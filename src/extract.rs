//! Structured posting extraction from the live results page.
//!
//! The core consumes postings through the [`ExtractionAdapter`] trait; the
//! default [`CardExtractor`] walks candidate card selectors from the site
//! profile through the fallback primitive and pulls each field out of the
//! first selector group that yields non-empty results.

use crate::browser::{sanitize_js_string, PageDriver};
use crate::config::SiteProfile;
use crate::fallback::{self, FallbackStrategy};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};

/// A single structured job listing.
///
/// The id is derived from company, title, and extraction time, so it is
/// unique within a run but NOT stable across runs. Treat it as a run-local
/// handle, never as a cross-run key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Posting {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub salary_text: Option<String>,
    pub url: Option<String>,
    pub description_text: Option<String>,
    pub supports_quick_apply: bool,
}

impl Posting {
    /// Run-local identity: `company_title_YYYYmmdd_HHMMSS`, lowercased with
    /// whitespace collapsed to underscores.
    pub fn derive_id(company: &str, title: &str, at: chrono::DateTime<Local>) -> String {
        let slug = |s: &str| {
            s.to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("_")
        };
        format!(
            "{}_{}_{}",
            slug(company),
            slug(title),
            at.format("%Y%m%d_%H%M%S")
        )
    }
}

/// Pluggable extraction boundary: raw page content in, structured postings out.
#[async_trait]
pub trait ExtractionAdapter: Send + Sync {
    /// Extract up to `limit` postings from the current page.
    async fn extract(&self, driver: &mut dyn PageDriver, limit: usize) -> Result<Vec<Posting>>;
}

/// Raw card fields as returned by the in-page collection script.
#[derive(Debug, Deserialize)]
struct RawCard {
    title: Option<String>,
    company: Option<String>,
    location: Option<String>,
    salary: Option<String>,
    url: Option<String>,
    description: Option<String>,
    quick_apply: bool,
}

/// Selector-table extractor driven by the [`SiteProfile`].
pub struct CardExtractor {
    site: SiteProfile,
}

impl CardExtractor {
    pub fn new(site: SiteProfile) -> Self {
        Self { site }
    }

    /// One JS expression that collects every card under `card_selector` into
    /// an array of raw field records.
    fn collect_script(&self, card_selector: &str, limit: usize) -> String {
        let field = |selectors: &[String], expr: &str| {
            let candidates = selectors
                .iter()
                .map(|s| format!("'{}'", sanitize_js_string(s)))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "(() => {{ for (const s of [{candidates}]) {{ const el = card.querySelector(s); if (el) return {expr}; }} return null; }})()"
            )
        };
        let marker = |selectors: &[String]| {
            let candidates = selectors
                .iter()
                .map(|s| format!("'{}'", sanitize_js_string(s)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("[{candidates}].some(s => card.querySelector(s) !== null)")
        };

        format!(
            r#"(() => {{
                const cards = [...document.querySelectorAll('{card}')].slice(0, {limit});
                return cards.map(card => ({{
                    title: {title},
                    company: {company},
                    location: {location},
                    salary: {salary},
                    url: {url},
                    description: {description},
                    quick_apply: {quick_apply}
                }}));
            }})()"#,
            card = sanitize_js_string(card_selector),
            limit = limit,
            title = field(&self.site.title_selectors, "el.textContent.trim()"),
            company = field(&self.site.company_selectors, "el.textContent.trim()"),
            location = field(&self.site.location_selectors, "el.textContent.trim()"),
            salary = field(&self.site.salary_selectors, "el.textContent.trim()"),
            url = field(&self.site.link_selectors, "el.href"),
            description = field(&self.site.description_selectors, "el.textContent.trim()"),
            quick_apply = marker(&self.site.quick_apply_markers),
        )
    }
}

#[async_trait]
impl ExtractionAdapter for CardExtractor {
    async fn extract(&self, driver: &mut dyn PageDriver, limit: usize) -> Result<Vec<Posting>> {
        // Candidate card selectors become ordered fallback strategies; the
        // first one producing a non-empty card list wins.
        let strategies: Vec<FallbackStrategy<'_, Vec<RawCard>>> = self
            .site
            .card_selectors
            .iter()
            .map(|selector| {
                let script = self.collect_script(selector, limit);
                let driver = &*driver;
                FallbackStrategy::new(format!("cards via {selector}"), move || async move {
                    let value = driver.eval_json(&script).await?;
                    let cards: Vec<RawCard> = serde_json::from_value(value)?;
                    Ok(cards)
                })
            })
            .collect();

        let raw = match fallback::acquire(strategies, |cards: &Vec<RawCard>| !cards.is_empty())
            .await
        {
            Ok(cards) => cards,
            Err(e) => {
                tracing::warn!(error = %e, "no listing locator strategy matched");
                return Ok(Vec::new());
            }
        };

        let now = Local::now();
        let postings = raw
            .into_iter()
            .filter_map(|card| {
                // Cards without both title and company are noise.
                let title = card.title.filter(|t| !t.is_empty())?;
                let company = card.company.filter(|c| !c.is_empty())?;
                Some(Posting {
                    id: Posting::derive_id(&company, &title, now),
                    title,
                    company,
                    location: card.location.unwrap_or_default(),
                    salary_text: card.salary.filter(|s| !s.is_empty()),
                    url: card.url.filter(|u| !u.is_empty()),
                    description_text: card.description.filter(|d| !d.is_empty()),
                    supports_quick_apply: card.quick_apply,
                })
            })
            .collect::<Vec<_>>();

        tracing::info!(count = postings.len(), "extracted postings");
        Ok(postings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    /// Driver stub that serves canned JSON per eval call.
    struct ScriptedEval {
        responses: Mutex<Vec<serde_json::Value>>,
    }

    #[async_trait]
    impl PageDriver for ScriptedEval {
        async fn navigate(&mut self, _url: &str, _timeout_ms: u64) -> Result<()> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn eval_json(&self, _script: &str) -> Result<serde_json::Value> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(anyhow!("no scripted response"));
            }
            Ok(responses.remove(0))
        }
        async fn count(&self, _selector: &str) -> Result<usize> {
            Ok(0)
        }
        async fn read_text(&self, _selector: &str) -> Result<Option<String>> {
            Ok(None)
        }
        async fn read_attr(&self, _selector: &str, _attr: &str) -> Result<Option<String>> {
            Ok(None)
        }
        async fn click(&self, _selector: &str) -> Result<bool> {
            Ok(false)
        }
        async fn type_text(&self, _selector: &str, _value: &str) -> Result<bool> {
            Ok(false)
        }
        async fn scroll_to_bottom(&self) -> Result<()> {
            Ok(())
        }
        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    fn card(title: &str, company: &str, quick: bool) -> serde_json::Value {
        serde_json::json!({
            "title": title,
            "company": company,
            "location": "Remote",
            "salary": null,
            "url": "https://example.invalid/jobs/view/1",
            "description": "python and sql",
            "quick_apply": quick,
        })
    }

    #[tokio::test]
    async fn test_first_nonempty_selector_wins() {
        let mut driver = ScriptedEval {
            // First candidate matches nothing, second yields two cards.
            responses: Mutex::new(vec![
                serde_json::json!([]),
                serde_json::json!([card("Analyst", "Acme", true), card("Engineer", "Globex", false)]),
            ]),
        };
        let extractor = CardExtractor::new(SiteProfile::default());
        let postings = extractor.extract(&mut driver, 20).await.unwrap();
        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].title, "Analyst");
        assert!(postings[0].supports_quick_apply);
        assert!(!postings[1].supports_quick_apply);
    }

    #[tokio::test]
    async fn test_all_selectors_empty_yields_no_postings() {
        let site = SiteProfile::default();
        let empties = vec![serde_json::json!([]); site.card_selectors.len()];
        let mut driver = ScriptedEval {
            responses: Mutex::new(empties),
        };
        let extractor = CardExtractor::new(site);
        let postings = extractor.extract(&mut driver, 20).await.unwrap();
        assert!(postings.is_empty());
    }

    #[tokio::test]
    async fn test_cards_missing_title_or_company_are_dropped() {
        let mut driver = ScriptedEval {
            responses: Mutex::new(vec![serde_json::json!([
                { "title": "", "company": "Acme", "location": null, "salary": null,
                  "url": null, "description": null, "quick_apply": false },
                card("Analyst", "Acme", true),
            ])]),
        };
        let extractor = CardExtractor::new(SiteProfile::default());
        let postings = extractor.extract(&mut driver, 20).await.unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].company, "Acme");
    }

    #[test]
    fn test_derive_id_shape() {
        let at = Local::now();
        let id = Posting::derive_id("Acme Corp", "Data  Analyst", at);
        assert!(id.starts_with("acme_corp_data_analyst_"));
        assert!(!id.contains(' '));
    }

    #[test]
    fn test_collect_script_embeds_all_candidates() {
        let extractor = CardExtractor::new(SiteProfile::default());
        let script = extractor.collect_script("[data-job-card]", 20);
        assert!(script.contains("slice(0, 20)"));
        for s in &extractor.site.title_selectors {
            assert!(script.contains(&sanitize_js_string(s)));
        }
    }
}
