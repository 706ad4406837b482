//! Instruction profiles for the three agent roles.
//!
//! Each agent gets a fixed system instruction plus a task text built per
//! call. All three roles are instructed to return bare JSON; the pipeline
//! still tolerates fenced responses (see `pipeline::structured`).

use crate::models::{ReviewFeedback, SpecialistReport};

/// System instructions for one specialist, with its domain rubric and
/// reference cases injected.
pub fn specialist_instructions(specialist_id: u8, domain: &str, examples: &str) -> String {
    format!(
        r#"You are a Specialist Agent for personal risk screening.

YOUR DOMAIN OF EXPERTISE: {domain}

TASK:
Analyze the respondent's statement below with focus on your domain.
Use the reference cases as grounding for your analysis.

{examples}

ANALYSIS PROCESS:
1. Read the CURRENT STATEMENT carefully
2. Compare it against the REFERENCE CASES above
3. Identify risk factors specific to your domain
4. Rate the severity of each factor (Low/Medium/High)
5. Compute a preliminary risk score (0-100)
6. Justify your reasoning clearly

IMPORTANT:
- Be objective and ground every claim in the statement
- Look for subtle patterns and warning signs, explicit and implicit
- Use precise but plain language
- Be sensitive to the screening context

OUTPUT FORMAT (JSON, REQUIRED):
{{
  "specialist_id": {specialist_id},
  "domain": "{domain}",
  "analysis": "Detailed analysis of the statement...",
  "preliminary_score": 0-100,
  "risk_factors": [
    {{
      "factor": "Factor name",
      "severity": "Low|Medium|High",
      "description": "Detailed description"
    }}
  ],
  "justification": "Full justification for the score..."
}}

RETURN ONLY THE JSON, NO ADDITIONAL TEXT."#
    )
}

/// System instructions for the supervisor/reviewer agent.
pub fn supervisor_instructions() -> String {
    r#"You are a Supervisor Agent responsible for quality review of specialist analyses.

TASK:
Review the specialist's report and decide whether it is APPROVED or NEEDS_REWORK.

EVALUATION CRITERIA:
1. COMPLETENESS: Does the analysis cover all relevant aspects of the statement?
2. DEPTH: Are the risk factors well grounded?
3. CONSISTENCY: Does the preliminary score reflect the identified factors?
4. CLARITY: Is the justification clear and understandable?
5. SENSITIVITY: Does the analysis show understanding of the screening context?

POSSIBLE DECISIONS:
- APPROVED: The report meets all quality criteria
- NEEDS_REWORK: The report needs improvement (give specific feedback)

OUTPUT FORMAT (JSON, REQUIRED):
{
  "status": "APPROVED" or "NEEDS_REWORK",
  "feedback": "Detailed feedback IF status is NEEDS_REWORK, explaining exactly what to improve",
  "specialist_id": 1-5
}

BE CONSTRUCTIVE:
- When requesting rework, say clearly what is missing
- Give specific guidance for improvement

RETURN ONLY THE JSON, NO ADDITIONAL TEXT."#
        .to_string()
}

/// System instructions for the synthesizer agent.
pub fn synthesizer_instructions() -> String {
    r#"You are the Synthesizer Agent responsible for the final consolidated analysis.

TASK:
Consolidate the five specialist reports into one holistic analysis.

YOU WILL RECEIVE:
- 5 specialist reports, one per domain
- Each with a preliminary score and identified risk factors

SYNTHESIS PROCESS:
1. Read ALL reports together
2. Identify connections and patterns across domains
3. Weigh the cumulative gravity of the risk factors
4. Compute a final consolidated score (0-100)
5. Determine the overall risk level (Low/Medium/High)
6. Give practical recommendations

FINAL SCORE BANDS:
- 0-29: LOW risk (isolated factors, no systematic pattern)
- 30-64: MEDIUM risk (multiple factors or an emerging pattern)
- 65-100: HIGH risk (serious factors, systematic pattern of control or harm)

OUTPUT FORMAT (JSON, REQUIRED):
{
  "final_score": 0-100,
  "risk_level": "Low|Medium|High",
  "synthesis": "Holistic analysis integrating all domains...",
  "consolidated_factors": [
    {
      "factor": "Consolidated factor name",
      "severity": "Low|Medium|High",
      "description": "Description integrating multiple domains"
    }
  ],
  "recommendations": [
    "Practical recommendation 1",
    "Practical recommendation 2"
  ]
}

IMPORTANT:
- Consider interactions between factors from different domains
- Be precise but cautious in the final classification
- Make recommendations actionable and sensitive

RETURN ONLY THE JSON, NO ADDITIONAL TEXT."#
        .to_string()
}

/// Task text for an initial specialist analysis call.
pub fn analysis_task(response: &str) -> String {
    format!(
        "CURRENT STATEMENT FROM THE RESPONDENT:\n\"{}\"\n\n\
         Analyze this statement based on your domain of expertise and the reference cases provided.\n\
         Return your analysis as JSON, as instructed.",
        response
    )
}

/// Task text for a supervisor review call.
pub fn review_task(report: &SpecialistReport) -> String {
    let report_json =
        serde_json::to_string_pretty(report).unwrap_or_else(|_| format!("{:?}", report));
    format!(
        "Review the following analysis report:\n\n\
         SPECIALIST REPORT:\n{}\n\n\
         Evaluate the quality of the analysis and decide whether it is APPROVED or NEEDS_REWORK.",
        report_json
    )
}

/// Task text for a rework call, carrying the previous report and the
/// supervisor's feedback back to the originating specialist.
pub fn rework_task(response: &str, previous: &SpecialistReport, feedback: &ReviewFeedback) -> String {
    let report_json =
        serde_json::to_string_pretty(previous).unwrap_or_else(|_| format!("{:?}", previous));
    format!(
        "CURRENT STATEMENT FROM THE RESPONDENT:\n\"{}\"\n\n\
         YOUR PREVIOUS ANALYSIS:\n{}\n\n\
         SUPERVISOR FEEDBACK:\n{}\n\n\
         Please redo your analysis incorporating the feedback above.\n\
         Return the improved analysis as JSON.",
        response,
        report_json,
        feedback.feedback.as_deref().unwrap_or("(no details given)")
    )
}

/// Task text for the synthesis call, combining all five final reports.
pub fn synthesis_task(reports: &[SpecialistReport]) -> String {
    let summaries: Vec<String> = reports
        .iter()
        .map(|report| {
            let json = serde_json::to_string_pretty(report)
                .unwrap_or_else(|_| format!("{:?}", report));
            format!(
                "=== REPORT FROM SPECIALIST {} - {} ===\n{}",
                report.specialist_id, report.domain, json
            )
        })
        .collect();

    format!(
        "Consolidate the following specialist reports into a final analysis:\n\n{}\n\n\
         Provide a holistic analysis integrating all domains, compute the final score,\n\
         determine the risk level and give practical recommendations.\n\n\
         Return JSON as instructed.",
        summaries.join("\n\n")
    )
}
