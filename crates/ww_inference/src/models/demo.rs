use rand::seq::SliceRandom;
use rand::Rng;
use ww_core::text::{clip, truncate_chars};
use ww_core::{BlogDraft, StoredArticle};

const HEADLINE_PATTERNS: &[&str] = &[
    "Breaking: {topic}: What It Means for Water Quality",
    "Inside the Crisis: {topic}",
    "Water Watch: {topic} Raises Industry Alarm",
    "Environmental Alert: {topic}",
    "Analysis: The Growing Threat Behind {topic}",
];

const TAG_MAP: &[(&str, &[&str])] = &[
    ("wastewater treatment", &["wastewater treatment", "water treatment"]),
    ("sewage", &["sewage", "sewage treatment"]),
    ("pollution", &["water pollution", "environmental pollution"]),
    ("epa", &["EPA", "environmental regulation"]),
    ("clean water act", &["Clean Water Act", "federal regulation"]),
    ("spill", &["pollution incident", "environmental emergency"]),
    ("contamination", &["water contamination", "public health"]),
    ("pfas", &["PFAS", "forever chemicals"]),
    ("algal bloom", &["harmful algal blooms", "HABs"]),
    ("red tide", &["red tide", "algal blooms"]),
    ("fine", &["environmental enforcement", "EPA fines"]),
    ("discharge", &["industrial discharge", "effluent"]),
    ("infrastructure", &["water infrastructure", "infrastructure investment"]),
];

const MAX_TAGS: usize = 6;
const MAX_META_CHARS: usize = 160;
const MAX_TOPIC_CHARS: usize = 60;

pub const IMAGE_PROMPT: &str = "Dramatic environmental photography of water treatment facility with industrial pipes \
    and water flow, blue and green tones, editorial style";

/// Offline writer used without an API key and whenever the model call fails.
#[derive(Debug, Default, Clone)]
pub struct DemoModel;

impl DemoModel {
    pub fn new() -> Self {
        Self
    }

    pub fn headline<R: Rng + ?Sized>(&self, title: &str, rng: &mut R) -> String {
        let topic = clip(title, MAX_TOPIC_CHARS);
        let pattern = HEADLINE_PATTERNS.choose(rng).copied().unwrap_or("{topic}");
        pattern.replace("{topic}", &topic)
    }

    /// Keyword-driven tags, deduplicated case-insensitively and capped.
    pub fn tags(&self, title: &str, summary: &str) -> Vec<String> {
        let text = format!("{} {}", title, summary).to_lowercase();
        let mut seen = Vec::new();
        let mut tags = Vec::new();
        for (keyword, mapped) in TAG_MAP {
            if !text.contains(keyword) {
                continue;
            }
            for tag in mapped.iter() {
                let key = tag.to_lowercase();
                if !seen.contains(&key) {
                    seen.push(key);
                    tags.push(tag.to_string());
                }
            }
        }
        tags.truncate(MAX_TAGS);
        tags
    }

    pub fn meta_description(&self, title: &str) -> String {
        let meta = format!(
            "Analysis of {}. Expert insights on wastewater treatment impacts and environmental implications.",
            truncate_chars(title, 80)
        );
        truncate_chars(&meta, MAX_META_CHARS)
    }

    pub fn draft(&self, article: &StoredArticle) -> BlogDraft {
        self.draft_with(article, &mut rand::thread_rng())
    }

    pub fn draft_with<R: Rng + ?Sized>(&self, article: &StoredArticle, rng: &mut R) -> BlogDraft {
        let headline = self.headline(&article.title, rng);
        let body = if article.content.is_empty() {
            article.summary.clone()
        } else {
            truncate_chars(&article.content, 800)
        };
        let content = render_body(&headline, &truncate_chars(&article.summary, 200), &body);

        BlogDraft {
            meta_description: self.meta_description(&article.title),
            tags: self.tags(&article.title, &article.summary),
            featured_image_prompt: IMAGE_PROMPT.to_string(),
            content,
            headline,
        }
    }
}

fn render_body(headline: &str, lead: &str, body: &str) -> String {
    format!(
        r#"<p class="lead"><strong>{headline}</strong>. In a development that underscores the ongoing challenges facing water treatment infrastructure, {lead}...</p>

<h2>What Happened</h2>
<p>{body}</p>

<h2>Environmental Impact Assessment</h2>
<p>The incident raises serious concerns about the effectiveness of current wastewater treatment protocols and their ability to protect public health and aquatic ecosystems. Events like these can cascade through local water systems, from drinking water supplies to recreational waterways.</p>

<h2>Regulatory Context</h2>
<p>The Clean Water Act requires facilities to meet specific effluent standards. Aging infrastructure and rising demand have made compliance increasingly difficult for many treatment plants.</p>

<blockquote>
<p>"The wastewater treatment industry is at a crossroads. We must invest in modernizing our infrastructure or face increasingly severe environmental consequences."</p>
</blockquote>

<h2>Industry Implications</h2>
<p>For treatment professionals this is a reminder to keep monitoring robust and compliance current. Membrane bioreactors, UV disinfection and automated monitoring are all drawing attention as upgrade paths.</p>

<h2>What This Means Going Forward</h2>
<ul>
<li><strong>Infrastructure Investment:</strong> Upgrading aging treatment plants to meet modern standards</li>
<li><strong>Enhanced Monitoring:</strong> Real-time water quality monitoring</li>
<li><strong>Regulatory Reform:</strong> Stronger enforcement and penalties for violations</li>
<li><strong>Public Awareness:</strong> Educating communities about water treatment infrastructure</li>
<li><strong>Innovation:</strong> New treatment technologies for emerging contaminants</li>
</ul>

<p><em>Stay informed about the latest developments in wastewater treatment and water quality.</em></p>"#
    )
}
