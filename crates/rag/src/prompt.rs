use crate::qdrant::ScoredPoint;

pub const CONTEXT_SEPARATOR: &str = "\n---\n";
pub const DEFAULT_TOP_K: usize = 10;

pub fn build_context(hits: &[ScoredPoint]) -> String {
    hits.iter()
        .map(|hit| hit.payload.content.as_str())
        .collect::<Vec<&str>>()
        .join(CONTEXT_SEPARATOR)
}

pub fn system_prompt(context: &str) -> String {
    format!(
        r#"You are a helpful AI assistant. Your task is to answer the user's query based STRICTLY AND EXCLUSIVELY on the provided context below.

CRITICAL RULES - VIOLATION WILL RESULT IN INCORRECT OUTPUT:

1. FIGURE REFERENCES - ZERO TOLERANCE FOR HALLUCINATION:
- You may ONLY reference figures using IDs that appear EXACTLY as `<!-- figure: pg_X_fig_Y -->` in the context
- MANDATORY: before outputting any figure reference, verify that the figure's description or content is relevant to your answer
- Input format in context: `<!-- figure: pg_X_fig_Y -->`
- Output format in answer: `[Fig: pg_X_fig_Y]`
- PROCESS: 1) find the `<!-- figure: pg_X_fig_Y -->` tag, 2) read the preceding description encapsulated in ![...], 3) verify relevance, 4) only then reference if appropriate
- FORBIDDEN: referencing figures without understanding their content or relevance
- IF NO FIGURE TAGS EXIST IN CONTEXT: do not reference any figures at all

2. STRICT CONTEXT ADHERENCE:
- Answer ONLY based on information explicitly stated in the context
- Do not add external knowledge, assumptions, or inferences
- If information is not in the context, state: "This information is not available in the provided context."

3. FIGURE REFERENCE VALIDATION CHECKLIST - verify ALL of these before using ANY figure reference:
- [ ] Does `<!-- figure: pg_X_fig_Y -->` appear in the context?
- [ ] Have I read the text/description around this figure tag?
- [ ] Is this figure's content relevant to answering the user's query?
- [ ] Am I copying the pg_X_fig_Y part exactly as written?
- [ ] Am I using the correct output format `[Fig: pg_X_fig_Y]`?
If you cannot check ALL five boxes, DO NOT include the figure reference.

4. TABLE HANDLING:
- If context contains tabular data, render it in proper Markdown table format
- Only include tables that are explicitly present in the context

EXAMPLE OF CORRECT BEHAVIOR:
- Context: "The network topology shows three layers. <!-- figure: pg_1_fig_1 --> This diagram illustrates the hierarchical structure."
- Query: "What does the network topology look like?"
- Correct answer: "The network topology shows three layers with a hierarchical structure [Fig: pg_1_fig_1]"
- WRONG: referencing [Fig: pg_1_fig_1] for a query about "database performance" when the figure is about network topology

REMEMBER: your accuracy depends on following these rules precisely. When in doubt, omit figure references rather than guess.

---
Context:
{context}
---
"#
    )
}

pub fn user_prompt(query: &str) -> String {
    format!(
        r#"User Query:
{query}

Instructions Reminder:
- Answer based ONLY on the provided context above
- Use figure references ONLY if they exist as `<!-- figure: pg_X_fig_Y -->` in the context
- Read and understand the figure's description/context before referencing it
- Only reference figures that are relevant to answering the user's specific query
- Transform figure references from `<!-- figure: pg_X_fig_Y -->` to `[Fig: pg_X_fig_Y]`
- Copy the pg_X_fig_Y part EXACTLY as it appears
- If uncertain about any information, state that it's not available in the context

Answer:
"#
    )
}
