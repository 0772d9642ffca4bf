//! Running the instructor test suite

use super::context::ExecutionContext;
use super::journal::Kind;
use super::messages::Message;
use super::session::Session;
use crate::error::Result;
use crate::runtime::Bindings;
use crate::testlib::DescriptionId;

/// Evaluate the instructor tests against the learner's functions, then run
/// the declared descriptions one at a time in declaration order.
///
/// A failing description sets the exit code to 1; when it is marked stop on
/// failure the remaining descriptions are skipped and `Ok(false)` is
/// returned. An instructor suite that does not evaluate is an `Err`.
pub fn run_instructor_tests(
    session: &Session,
    context: &mut ExecutionContext,
    source: &str,
    bindings: &Bindings,
) -> Result<bool> {
    session.say(Kind::Info, Message::StartTests);

    let imports: Bindings = session
        .config()
        .functions
        .keys()
        .filter_map(|name| bindings.get(name).map(|f| (name.clone(), f.clone())))
        .collect();

    let (evaluated, descriptions) =
        context.collect_descriptions(|rt| rt.eval_with_bindings(source, &imports));
    evaluated?;
    session.milestone("after instructor tests defined");

    let completed = run_descriptions(session, context, &descriptions)?;
    session.milestone(format!("after run_descriptions {}", completed));
    Ok(completed)
}

fn run_descriptions(
    session: &Session,
    context: &mut ExecutionContext,
    descriptions: &[DescriptionId],
) -> Result<bool> {
    for (i, id) in descriptions.iter().enumerate() {
        session.milestone(format!("run_description {}", i));
        let pass = context.run_description(*id)?;
        session.milestone(format!("after describe {}", i));
        if !pass {
            session.set_exit_code(1);
            if context.library().description(*id).stop_on_failure {
                tracing::debug!(index = i, "stopping after failed description");
                return Ok(false);
            }
        }
    }
    session.milestone("run_description end");
    Ok(true)
}
