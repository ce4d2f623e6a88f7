use super::{INST_END, INST_START, PAIR_END, PAIR_START, SYS_END, SYS_START, Turn};

/// Render paired turns into Llama-2 markup.
/// - Turn block:
///   `<s>[INST] <<SYS>>\n{SYSTEM}\n<</SYS>>\n\n{USER} [/INST] {BOT} </s>`
///   with the `<<SYS>>` section on the first block only.
/// - Suffix block:
///   `<s>[INST] {SUFFIX} [/INST]</s>`
pub fn render_prompt(turns: &[Turn<'_>], system_prompt: &str, suffix: &str) -> String {
    fn push_system(buf: &mut String, system: &str) {
        buf.push_str(SYS_START);
        buf.push('\n');
        buf.push_str(system);
        buf.push('\n');
        buf.push_str(SYS_END);
        buf.push_str("\n\n");
    }

    fn push_turn(buf: &mut String, system: Option<&str>, user: &str, bot: &str) {
        buf.push_str(PAIR_START);
        buf.push_str(INST_START);
        buf.push(' ');
        if let Some(system) = system {
            push_system(buf, system);
        }
        buf.push_str(user.trim());
        buf.push(' ');
        buf.push_str(INST_END);
        buf.push(' ');
        buf.push_str(bot.trim());
        buf.push(' ');
        buf.push_str(PAIR_END);
    }

    fn push_instruction(buf: &mut String, instruction: &str) {
        buf.push_str(PAIR_START);
        buf.push_str(INST_START);
        buf.push(' ');
        buf.push_str(instruction);
        buf.push(' ');
        buf.push_str(INST_END);
        buf.push_str(PAIR_END);
    }

    let system_prompt = system_prompt.trim();
    let mut system = (!system_prompt.is_empty()).then_some(system_prompt);

    let mut out = String::new();
    for turn in turns {
        // take(): only the first block carries the system section
        push_turn(&mut out, system.take(), turn.user, turn.bot);
    }

    let suffix = suffix.trim();
    if !suffix.is_empty() {
        push_instruction(&mut out, suffix);
    }

    out.trim().to_string()
}
