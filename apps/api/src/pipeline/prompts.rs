// Prompt templates for the question and feedback stages.
// Placeholders are `{name}` and are filled with `str::replace`.

pub const QUESTION_SYSTEM_TEMPLATE: &str = "\
You are an expert interviewer with deep knowledge of {category} interviews.
Your task is to write interview questions for a {level} level candidate.

Guidelines:
- Write exactly {count} questions, each one unique
- Questions must be appropriate for the {level} level; avoid generic questions that fit any role
- Mix theoretical and practical questions with varying difficulty
- Make questions specific and grounded in real-world scenarios
- Each question must be answerable out loud in two to three minutes

{format_instruction}";

pub const QUESTION_USER_TEMPLATE: &str = "\
Interview context:
- Position: {title}
- Level: {level}
- Category: {category}{job_url_line}{requirements_block}{resume_block}

Generate exactly {count} interview questions now, numbered 1 to {count}, one per line.";

pub const FEEDBACK_SYSTEM: &str = "\
You are an expert interview coach giving feedback on an entire mock interview.
Analyze every question and answer and provide:
1. An overall score (0-100) based on communication clarity, answer completeness, relevance to the questions and professional presentation
2. A summary of the overall performance
3. Key strengths demonstrated across the answers
4. Areas for improvement
5. Specific, actionable recommendations for future interviews

Be constructive, specific and encouraging while staying honest about weak spots.

Formatting rules for \"key_strengths\", \"areas_for_improvement\" and \"recommendations\":
- When there are several points, number them and put each on its own line:
  1. First point
  2. Second point
- Never put multiple numbered items on the same line

Return this JSON shape:
{
  \"overall_score\": 75,
  \"summary\": \"...\",
  \"key_strengths\": \"1. ...\\n2. ...\",
  \"areas_for_improvement\": \"1. ...\\n2. ...\",
  \"recommendations\": \"1. ...\\n2. ...\"
}";

pub const FEEDBACK_USER_TEMPLATE: &str = "\
Interview Session: {title}
Position Level: {level}
Category: {category}
Total Questions: {count}

Questions and Answers:
{qa_block}

Provide comprehensive overall feedback for this entire interview session.";

/// Placeholder used for questions without a transcribed answer.
pub const NO_ANSWER_PLACEHOLDER: &str = "No answer provided";
