use async_trait::async_trait;

use super::{BackendError, FragmentSource, FragmentStream, split_words};
use crate::models::{GenerationRequest, SummaryStyle};

pub const CONCISE_SUMMARY: &str = "This blog post explores AI's transformative impact on web development. It highlights how AI tools enable developers to work 40% faster while maintaining quality. Key applications include code generation, bug detection, and automated documentation. The Vercel AI SDK is presented as a standout solution with TypeScript support, streaming capabilities, and seamless Next.js integration. The article emphasizes that AI augments rather than replaces developers, offering early adopters a competitive advantage in the evolving landscape of web development.";

pub const DETAILED_SUMMARY: &str = "This comprehensive blog post examines the revolutionary role of Artificial Intelligence in modern web development. The article presents compelling data showing that developers using AI assistants complete tasks 40% faster than their counterparts, emphasizing that this improvement extends beyond mere speed to encompass quality, creativity, and focus.\n\nThe post details five major real-world applications: automated code generation from descriptions, proactive bug detection systems, automatic documentation generation from code comments, intelligent test case creation, and AI-driven performance optimization suggestions. Special attention is given to Vercel's AI SDK, which is praised for its developer-friendly features including full TypeScript support, real-time streaming responses, compatibility with over 25 LLM providers, edge runtime optimization, and seamless integration with Next.js and React.\n\nLooking toward 2026, the article predicts deeper integration of AI into development workflows and emphasizes that the critical question is no longer whether to adopt AI tools, but how to use them effectively. The conclusion reinforces that AI serves as an augmentation tool for developers rather than a replacement, positioning early adopters for significant competitive advantages in the evolving landscape of web development.";

/// Canned summaries, independent of the submitted content.
#[derive(Debug, Clone, Default)]
pub struct MockSource;

impl MockSource {
    pub fn new() -> Self {
        Self
    }

    pub fn summary_for(style: SummaryStyle) -> &'static str {
        match style {
            SummaryStyle::Concise => CONCISE_SUMMARY,
            SummaryStyle::Detailed => DETAILED_SUMMARY,
        }
    }
}

#[async_trait]
impl FragmentSource for MockSource {
    async fn fragments(&self, request: &GenerationRequest) -> Result<FragmentStream, BackendError> {
        Ok(split_words(Self::summary_for(request.style)))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
