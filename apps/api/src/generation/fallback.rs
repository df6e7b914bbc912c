//! Static fallback content for demo mode and degraded generation.
//!
//! Served when the caller asks for a free demo run, or when the aggregator
//! is unavailable. Always labeled as such in the response; never presented
//! as personalized output.

use crate::generation::ResumeContent;

pub fn demo_content() -> ResumeContent {
    ResumeContent {
        summary: "Versatile software engineer with experience shipping web \
                  applications end to end, from data modeling through API design \
                  to production deployment. Comfortable owning features across \
                  the stack and collaborating with product teams."
            .to_string(),
        keywords: [
            "software engineering",
            "web applications",
            "REST APIs",
            "SQL",
            "cloud deployment",
            "testing",
        ]
        .map(String::from)
        .to_vec(),
        bullets: [
            "Designed and shipped customer-facing features across a multi-service web application",
            "Built REST APIs backed by relational data models, with automated test coverage",
            "Reduced page-load latency by profiling and removing redundant backend queries",
            "Collaborated with design and product to scope work and deliver on schedule",
            "Maintained CI pipelines and review practices across a small engineering team",
        ]
        .map(String::from)
        .to_vec(),
    }
}
