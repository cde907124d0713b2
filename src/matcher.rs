//! Profile-to-posting match scoring.
//!
//! Requirements are pulled out of the posting description with a fixed
//! keyword taxonomy and a small set of phrase patterns, then scored against
//! the user profile as a weighted sum of five sub-scores. Scoring is pure:
//! identical inputs always produce identical results.

use crate::extract::Posting;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Skill keyword taxonomy, in fixed category order. Missing-skill ordering
/// and the technical-category check both depend on this order.
const SKILL_TAXONOMY: &[(&str, &[&str])] = &[
    (
        "programming",
        &[
            "python", "java", "javascript", "typescript", "c++", "c#", "go", "rust", "php",
            "ruby", "swift", "kotlin", "scala", "r", "matlab", "sql",
        ],
    ),
    (
        "data_science",
        &[
            "machine learning",
            "deep learning",
            "artificial intelligence",
            "ai",
            "data analysis",
            "statistics",
            "pandas",
            "numpy",
            "scikit-learn",
            "tensorflow",
            "pytorch",
            "keras",
            "spark",
            "hadoop",
            "tableau",
            "power bi",
            "excel",
            "r",
            "python",
            "sql",
        ],
    ),
    (
        "web_development",
        &[
            "html",
            "css",
            "javascript",
            "react",
            "angular",
            "vue",
            "node.js",
            "express",
            "django",
            "flask",
            "spring",
            "laravel",
            "php",
            "ruby on rails",
            "api",
            "rest",
            "graphql",
            "microservices",
            "docker",
            "kubernetes",
        ],
    ),
    (
        "cloud",
        &[
            "aws",
            "azure",
            "gcp",
            "google cloud",
            "amazon web services",
            "docker",
            "kubernetes",
            "terraform",
            "ansible",
            "jenkins",
            "ci/cd",
            "devops",
            "microservices",
            "serverless",
            "lambda",
        ],
    ),
    (
        "databases",
        &[
            "mysql",
            "postgresql",
            "mongodb",
            "redis",
            "elasticsearch",
            "oracle",
            "sql server",
            "sqlite",
            "cassandra",
            "dynamodb",
        ],
    ),
    (
        "soft_skills",
        &[
            "leadership",
            "communication",
            "teamwork",
            "problem solving",
            "project management",
            "agile",
            "scrum",
            "mentoring",
            "presentation",
        ],
    ),
];

/// Categories whose presence triggers the portfolio recommendation.
const TECHNICAL_CATEGORIES: &[&str] = &["programming", "web_development", "data_science"];

const EDUCATION_KEYWORDS: &[&str] = &[
    "bachelor",
    "master",
    "phd",
    "degree",
    "diploma",
    "certification",
];

const REMOTE_INDICATORS: &[&str] = &["remote", "work from home", "wfh", "distributed", "virtual"];

/// Numeric-experience phrasings; the maximum matched value wins.
const EXPERIENCE_PATTERNS: &[&str] = &[
    r"(\d+)\+?\s*years?\s*(?:of\s*)?experience",
    r"(\d+)\+?\s*years?\s*in",
    r"minimum\s*(\d+)\s*years?",
    r"at\s*least\s*(\d+)\s*years?",
];

/// Salary phrasings, tried in priority order; first match wins.
const SALARY_PATTERNS: &[&str] = &[
    r"\$(\d+(?:,\d{3})*(?:k|k\+)?)\s*(?:-|to|–)\s*\$(\d+(?:,\d{3})*(?:k|k\+)?)",
    r"salary[:\s]*\$(\d+(?:,\d{3})*(?:k|k\+)?)",
    r"compensation[:\s]*\$(\d+(?:,\d{3})*(?:k|k\+)?)",
];

/// The user being applied for. Read-only during a run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub skills: HashSet<String>,
    pub experience_years: u32,
    pub education: HashSet<String>,
    pub certifications: HashSet<String>,
    pub preferred_industries: HashSet<String>,
    pub preferred_locations: HashSet<String>,
    pub salary_expectation: Option<u64>,
    pub remote_preference: bool,
    pub company_size_preference: Option<crate::config::CompanySize>,
}

/// Scored output of comparing a profile against one posting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchResult {
    pub posting_id: String,
    /// Weighted total in `[0, 100]`, rounded to two decimals.
    pub score: f64,
    pub reasons: Vec<String>,
    pub missing_skills: Vec<String>,
    pub recommendations: Vec<String>,
}

/// The five sub-score weights. Must sum to 1.0.
#[derive(Clone, Copy, Debug)]
pub struct Weights {
    pub skills: f64,
    pub experience: f64,
    pub education: f64,
    pub location: f64,
    pub industry: f64,
}

#[derive(Debug, Error)]
#[error("scoring weights must sum to 1.0, got {0}")]
pub struct WeightError(f64);

impl Weights {
    pub fn new(
        skills: f64,
        experience: f64,
        education: f64,
        location: f64,
        industry: f64,
    ) -> Result<Self, WeightError> {
        let w = Self {
            skills,
            experience,
            education,
            location,
            industry,
        };
        let sum = w.sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(WeightError(sum));
        }
        Ok(w)
    }

    pub fn sum(&self) -> f64 {
        self.skills + self.experience + self.education + self.location + self.industry
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            skills: 0.40,
            experience: 0.25,
            education: 0.15,
            location: 0.10,
            industry: 0.10,
        }
    }
}

/// Requirements extracted from one posting description.
#[derive(Clone, Debug, Default)]
pub struct JobRequirements {
    /// Matched keywords per category, in taxonomy order. Categories with no
    /// hits carry an empty list.
    pub skills: Vec<(&'static str, Vec<&'static str>)>,
    pub min_experience: u32,
    pub education_required: Vec<&'static str>,
    pub is_remote: bool,
    pub salary: Option<String>,
}

/// Keyword scorer over the fixed taxonomy.
pub struct MatchScorer {
    weights: Weights,
    experience_patterns: Vec<Regex>,
    salary_patterns: Vec<Regex>,
}

impl MatchScorer {
    pub fn new() -> Self {
        Self::with_weights(Weights::default())
    }

    pub fn with_weights(weights: Weights) -> Self {
        // Patterns are compile-time constants; a unit test guards them.
        let compile = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|p| Regex::new(p).expect("static pattern"))
                .collect()
        };
        Self {
            weights,
            experience_patterns: compile(EXPERIENCE_PATTERNS),
            salary_patterns: compile(SALARY_PATTERNS),
        }
    }

    /// Pull structured requirements out of a lowercased description.
    pub fn extract_requirements(&self, description: &str) -> JobRequirements {
        let text = description.to_lowercase();

        let skills = SKILL_TAXONOMY
            .iter()
            .map(|(category, keywords)| {
                let hits: Vec<&'static str> = keywords
                    .iter()
                    .copied()
                    .filter(|kw| keyword_present(&text, kw))
                    .collect();
                (*category, hits)
            })
            .collect();

        let min_experience = self
            .experience_patterns
            .iter()
            .flat_map(|re| re.captures_iter(&text))
            .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse::<u32>().ok()))
            .max()
            .unwrap_or(0);

        let education_required = EDUCATION_KEYWORDS
            .iter()
            .copied()
            .filter(|kw| text.contains(kw))
            .collect();

        let is_remote = REMOTE_INDICATORS.iter().any(|kw| text.contains(kw));

        let salary = self
            .salary_patterns
            .iter()
            .find_map(|re| re.find(&text))
            .map(|m| m.as_str().to_string());

        JobRequirements {
            skills,
            min_experience,
            education_required,
            is_remote,
            salary,
        }
    }

    /// Score a posting against a profile. Deterministic; result in `[0, 100]`.
    pub fn score(&self, profile: &UserProfile, posting: &Posting) -> MatchResult {
        let description = posting.description_text.as_deref().unwrap_or("");
        let requirements = self.extract_requirements(description);
        let full_text = format!("{} {}", posting.title, description).to_lowercase();

        let mut reasons = Vec::new();
        let mut missing_skills: Vec<String> = Vec::new();

        let profile_skills: HashSet<String> =
            profile.skills.iter().map(|s| s.to_lowercase()).collect();

        // Skills: Σ matched / Σ required, or full marks when nothing required.
        let mut total_required = 0usize;
        let mut total_matched = 0usize;
        for (category, required) in &requirements.skills {
            if required.is_empty() {
                continue;
            }
            total_required += required.len();
            let mut matched = 0usize;
            for kw in required {
                if profile_skills.contains(*kw) {
                    matched += 1;
                } else if !missing_skills.iter().any(|m| m == kw) {
                    missing_skills.push(kw.to_string());
                }
            }
            total_matched += matched;
            if matched > 0 {
                reasons.push(format!(
                    "Matched {matched}/{} {category} skills",
                    required.len()
                ));
            }
        }
        let skill_score = if total_required > 0 {
            total_matched as f64 / total_required as f64 * 100.0
        } else {
            reasons.push("No specific skills required".to_string());
            100.0
        };

        // Experience.
        let experience_score = if profile.experience_years >= requirements.min_experience {
            reasons.push(format!(
                "Meets experience requirement ({} years)",
                profile.experience_years
            ));
            100.0
        } else {
            reasons.push(format!(
                "Below experience requirement ({}/{} years)",
                profile.experience_years, requirements.min_experience
            ));
            profile.experience_years as f64 / requirements.min_experience as f64 * 100.0
        };

        // Education.
        let education_score = if requirements.education_required.is_empty() {
            reasons.push("No specific education requirements".to_string());
            100.0
        } else {
            let joined = profile
                .education
                .iter()
                .map(|e| e.to_lowercase())
                .collect::<Vec<_>>()
                .join(" ");
            let met = requirements
                .education_required
                .iter()
                .any(|req| joined.contains(req));
            reasons.push(if met {
                "Meets education requirements".to_string()
            } else {
                "May not meet education requirements".to_string()
            });
            if met {
                100.0
            } else {
                50.0
            }
        };

        // Location.
        let location_score = if requirements.is_remote && profile.remote_preference {
            reasons.push("Remote work preference matched".to_string());
            100.0
        } else if !requirements.is_remote && !profile.preferred_locations.is_empty() {
            let posting_location = posting.location.to_lowercase();
            let matched = profile
                .preferred_locations
                .iter()
                .any(|loc| posting_location.contains(&loc.to_lowercase()));
            reasons.push(if matched {
                "Location preference matched".to_string()
            } else {
                "Location may not match preferences".to_string()
            });
            if matched {
                100.0
            } else {
                50.0
            }
        } else {
            75.0
        };

        // Industry.
        let industry_score = if profile.preferred_industries.is_empty() {
            75.0
        } else {
            let matched = profile
                .preferred_industries
                .iter()
                .any(|ind| full_text.contains(&ind.to_lowercase()));
            reasons.push(if matched {
                "Industry preference matched".to_string()
            } else {
                "Industry may not match preferences".to_string()
            });
            if matched {
                100.0
            } else {
                50.0
            }
        };

        let total = skill_score * self.weights.skills
            + experience_score * self.weights.experience
            + education_score * self.weights.education
            + location_score * self.weights.location
            + industry_score * self.weights.industry;
        let score = (total * 100.0).round() / 100.0;

        let recommendations = self.recommendations(profile, &requirements, &missing_skills);

        MatchResult {
            posting_id: posting.id.clone(),
            score: score.clamp(0.0, 100.0),
            reasons,
            missing_skills,
            recommendations,
        }
    }

    /// Deterministic improvement suggestions derived from the gap analysis.
    fn recommendations(
        &self,
        profile: &UserProfile,
        requirements: &JobRequirements,
        missing_skills: &[String],
    ) -> Vec<String> {
        let mut recs = Vec::new();

        if !missing_skills.is_empty() {
            let top: Vec<&str> = missing_skills.iter().take(3).map(|s| s.as_str()).collect();
            recs.push(format!("Consider learning: {}", top.join(", ")));
        }

        if profile.experience_years < requirements.min_experience {
            let gap = requirements.min_experience - profile.experience_years;
            recs.push(format!(
                "Gain {gap} more years of experience or highlight relevant projects"
            ));
        }

        if !requirements.education_required.is_empty() {
            let joined = profile
                .education
                .iter()
                .map(|e| e.to_lowercase())
                .collect::<Vec<_>>()
                .join(" ");
            if !requirements
                .education_required
                .iter()
                .any(|req| joined.contains(req))
            {
                recs.push(
                    "Consider highlighting relevant certifications or equivalent experience"
                        .to_string(),
                );
            }
        }

        let technical_required = requirements
            .skills
            .iter()
            .any(|(category, hits)| TECHNICAL_CATEGORIES.contains(category) && !hits.is_empty());
        if technical_required {
            recs.push("Ensure your portfolio is up to date".to_string());
        }

        recs.push("Research the company and connect with current employees".to_string());
        recs
    }

    /// Top-5 required keywords absent from the profile, ranked by how often
    /// they appear in the description. Useful for resume tailoring.
    pub fn resume_keywords(&self, profile: &UserProfile, description: &str) -> Vec<String> {
        let text = description.to_lowercase();
        let requirements = self.extract_requirements(description);
        let profile_skills: HashSet<String> =
            profile.skills.iter().map(|s| s.to_lowercase()).collect();

        let mut ranked: Vec<(String, usize)> = Vec::new();
        for (_, hits) in &requirements.skills {
            for kw in hits {
                if profile_skills.contains(*kw) || ranked.iter().any(|(k, _)| k == kw) {
                    continue;
                }
                ranked.push((kw.to_string(), text.matches(kw).count()));
            }
        }
        ranked.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
        ranked.into_iter().take(5).map(|(kw, _)| kw).collect()
    }
}

impl Default for MatchScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Whole-token keyword check: the match may not be glued to adjacent
/// alphanumerics. Keeps one-letter keywords like "r" and short ones like
/// "ai" or "go" from hitting inside ordinary words.
fn keyword_present(text: &str, keyword: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = text[start..].find(keyword) {
        let begin = start + pos;
        let end = begin + keyword.len();
        let before_ok = begin == 0
            || !text.as_bytes()[begin - 1].is_ascii_alphanumeric();
        let after_ok =
            end == text.len() || !text.as_bytes()[end].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return true;
        }
        start = begin + 1;
    }
    false
}
