//! Loading learner code and extracting the required functions

use super::context::ExecutionContext;
use super::journal::Kind;
use super::messages::Message;
use super::session::Session;
use crate::runtime::Bindings;

/// Evaluate learner code and collect the functions the exercise requires.
///
/// Returns `None` when the code is rejected: it does not load, it fails its
/// own tests, or a required function is missing. The reason is journaled.
pub fn extract_bindings(session: &Session, context: &mut ExecutionContext, source: &str) -> Option<Bindings> {
    session.say(Kind::Info, Message::StartEvaluation);
    let names = session.config().function_names();

    let (evaluated, self_tests) =
        context.collect_descriptions(|rt| rt.eval_isolated(source, &names));
    let bindings = match evaluated {
        Ok(bindings) => bindings,
        Err(error) => {
            tracing::debug!(%error, "learner code rejected");
            let exception = error.exception_text();
            session.say(Kind::Error, Message::NotSatisfying { exception: &exception });
            return None;
        }
    };
    session.trace("after invoking student's code function");

    if !self_tests.is_empty() {
        let mut coherent = true;
        for id in self_tests {
            match context.run_description(id) {
                Ok(pass) => coherent &= pass,
                Err(error) => {
                    session.trace(format!("self test {} aborted: {}", id.0, error));
                    coherent = false;
                }
            }
        }
        if !coherent {
            session.say(Kind::Error, Message::FailOwnTests);
            return None;
        }
    }

    if !session.config().dont_check_functions {
        session.trace("Checking extractions");
        let mut complete = true;
        for name in &names {
            session.trace(format!("Checking extraction {}", name));
            if bindings.get(name).is_some_and(|f| f.is_callable()) {
                session.say(Kind::Info, Message::IsAFunction { name });
            } else {
                session.say(Kind::Warning, Message::NotAFunction { name });
                complete = false;
            }
        }
        if !complete {
            return None;
        }
    }

    tracing::debug!(functions = bindings.len(), "learner bindings extracted");
    Some(bindings)
}
