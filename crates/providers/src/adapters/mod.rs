//! Per-provider request builders and response normalizers.
//!
//! Each adapter is a bundle of pure functions: intent in, wire body out,
//! and provider payload in, [`GenerationResult`] out. All vocabulary
//! differences between providers (resolution naming, aspect expression,
//! image ceilings, payload shapes) are absorbed here so the orchestrator
//! never inspects provider-specific fields.

pub mod gemini;
pub mod gpt_image;
pub mod nano;
