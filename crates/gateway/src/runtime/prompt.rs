//! Prompt assembly for one turn.
//!
//! Order is fixed: persona, optional context block, prior history (oldest
//! first, windowed), then the new user message.

use lt_domain::config::STUDENT_PLACEHOLDER;
use lt_domain::message::{Message, Role};
use lt_domain::principal::Principal;

/// Built-in tutor persona. `{student}` is replaced with the student name.
pub const DEFAULT_PERSONA: &str = "\
Eres un tutor experto en Derecho para estudiantes universitarios. Tu objetivo es ser empático, pedagógico y motivador.

REGLAS DE COMPORTAMIENTO:
- Recuerda siempre que el nombre del alumno es {student}. Refiérete a él/ella de forma natural.
- Usa un tono profesional pero cercano, como un mentor.
- No des la respuesta directamente de inmediato. Usa el método socrático: haz preguntas que guíen al estudiante a razonar.
- Si el estudiante explica un concepto, usa el método Feynman para comprobar si lo ha entendido (pídele que lo explique \"como si tuviera 5 años\").
- Fomenta el pensamiento crítico legal.";

/// Identity display name, then the name the client sent, then `fallback`.
pub fn student_name(principal: &Principal, requested: Option<&str>, fallback: &str) -> String {
    principal
        .name()
        .or_else(|| requested.map(str::trim).filter(|n| !n.is_empty()))
        .unwrap_or(fallback)
        .to_owned()
}

pub fn persona(template: Option<&str>, student: &str) -> String {
    template
        .unwrap_or(DEFAULT_PERSONA)
        .replace(STUDENT_PLACEHOLDER, student)
}

/// The last `max_history` user/assistant entries of `history`, in order.
/// System entries from the client are dropped.
pub fn window(history: &[Message], max_history: usize) -> Vec<Message> {
    let turns: Vec<&Message> = history
        .iter()
        .filter(|m| m.role != Role::System && !m.content.trim().is_empty())
        .collect();
    let skip = turns.len().saturating_sub(max_history);
    if skip > 0 {
        tracing::debug!(dropped = skip, kept = max_history, "history window applied");
    }
    turns.into_iter().skip(skip).cloned().collect()
}

pub fn assemble(
    persona: &str,
    context_block: &str,
    history: &[Message],
    max_history: usize,
    user_message: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len().min(max_history) + 3);
    messages.push(Message::system(persona));
    if !context_block.is_empty() {
        messages.push(Message::system(context_block));
    }
    messages.extend(window(history, max_history));
    messages.push(Message::user(user_message));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_beats_requested_name() {
        let ana = Principal::new("u1").with_display_name("Ana");
        assert_eq!(student_name(&ana, Some("Luis"), "estudiante"), "Ana");

        let anon = Principal::new("u2");
        assert_eq!(student_name(&anon, Some(" Luis "), "estudiante"), "Luis");
        assert_eq!(student_name(&anon, Some(""), "estudiante"), "estudiante");
        assert_eq!(student_name(&anon, None, "estudiante"), "estudiante");
    }

    #[test]
    fn persona_substitutes_student() {
        let p = persona(None, "Ana");
        assert!(p.contains("el nombre del alumno es Ana."));
        assert!(!p.contains(STUDENT_PLACEHOLDER));
        assert_eq!(persona(Some("Hola {student}"), "Ana"), "Hola Ana");
    }

    #[test]
    fn order_is_persona_context_history_user() {
        let history = vec![Message::user("q1"), Message::assistant("a1")];
        let msgs = assemble("P", "CTX", &history, 20, "q2");
        let roles: Vec<Role> = msgs.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(msgs[1].content, "CTX");
        assert_eq!(msgs[4].content, "q2");
    }

    #[test]
    fn empty_context_adds_no_entry() {
        let msgs = assemble("P", "", &[], 20, "q");
        assert_eq!(msgs, vec![Message::system("P"), Message::user("q")]);
    }

    #[test]
    fn window_keeps_most_recent() {
        let history: Vec<Message> = (0..30)
            .map(|i| Message::user(format!("m{i}")))
            .chain(std::iter::once(Message::system("injected")))
            .collect();
        let kept = window(&history, 20);
        assert_eq!(kept.len(), 20);
        assert_eq!(kept[0].content, "m10");
        assert_eq!(kept[19].content, "m29");
        assert!(kept.iter().all(|m| m.role == Role::User));
    }
}
