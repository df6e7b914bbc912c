//! Prompt templates for the generation pipeline.

pub const KEYWORD_SYSTEM: &str = "You are an expert technical recruiter. \
You extract the skills and qualifications a job description actually asks for. \
Respond with valid JSON only.";

pub const KEYWORD_PROMPT_TEMPLATE: &str = r#"Extract the most important keywords from this job description.

Return a JSON array of 8-15 short keyword strings, ordered by importance.
Include hard skills, tools, and domain terms. Exclude generic filler
("team player", "fast-paced").

Job description:
{jd_text}"#;

pub const GENERATION_SYSTEM: &str = "You are an expert resume writer. \
You write tight, achievement-oriented resume content tailored to a specific \
job description. Respond with valid JSON only.";

pub const GENERATION_PROMPT_TEMPLATE: &str = r#"Write tailored resume content for a candidate applying to the job below.

Return JSON with exactly this shape:
{"summary": "...", "bullets": ["...", "..."]}

Rules:
- "summary": 2-3 sentences positioning the candidate for this role.
- "bullets": 5-8 achievement bullets, each starting with a strong verb and
  weaving in the target keywords where honest.
- Never invent employers, titles, or credentials.

Target keywords: {keywords_json}

Job description:
{jd_text}"#;
