//! Serializes a determined module to a VHDL entity/architecture pair. Purely
//! a reader over the HIR — emission mutates nothing but the filesystem.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::csd::Sign;
use crate::error::{CcError, Result};
use crate::hir::{Block, Builder, ModuleId, PortDir, Signal};

use super::vhdl_parse::{self, ExternalEntity};

fn width_of(signal: &Signal) -> Result<u32> {
    signal.width.ok_or_else(|| CcError::WidthIndeterminate {
        signal: signal.name.clone(),
    })
}

fn vector_type(width: u32) -> String {
    if width == 1 {
        "std_logic".to_string()
    } else {
        format!("std_logic_vector({} downto 0)", width - 1)
    }
}

fn slice(name: &str, width: u32, upper: Option<u32>, lower: Option<u32>) -> String {
    let upper = upper.unwrap_or(width - 1);
    let lower = lower.unwrap_or(0);
    if width == 1 {
        name.to_string()
    } else if upper == width - 1 && lower == 0 {
        name.to_string()
    } else if upper == lower {
        format!("{name}({upper})")
    } else {
        format!("{name}({upper} downto {lower})")
    }
}

fn stage_name(signal: &Signal, stage: u32) -> String {
    if stage == 0 {
        signal.name.clone()
    } else {
        format!("b{stage}_{}", signal.name)
    }
}

/// Name a block drives when assigning this signal's combinational value.
fn write_name(signal: &Signal) -> String {
    stage_name(signal, 0)
}

/// Name a reader sees: the fully pipelined value if the signal carries
/// register stages, otherwise the bare combinational wire.
fn read_name(signal: &Signal) -> String {
    stage_name(signal, signal.buffer)
}

fn twos_complement_literal(value: i64, width: u32) -> String {
    let mask: u64 = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
    let bits = (value as u64) & mask;
    format!("\"{:0width$b}\"", bits, width = width as usize)
}

fn ternary_behavior(sign_b: Sign, sign_c: Sign) -> &'static str {
    match (sign_b, sign_c) {
        (Sign::Pos, Sign::Pos) => "add_addw",
        (Sign::Pos, Sign::Neg) | (Sign::Neg, Sign::Pos) => "add_subw",
        (Sign::Neg, Sign::Neg) => "sub_subw",
    }
}

/// Builds the ternary-adder instantiation statement from its real parsed
/// entity (generic and port names) rather than literal strings, validating
/// that the `width` generic actually resolves the output port to the
/// expected index before emitting anything.
fn ternary_instance(entity: &ExternalEntity, width_out: u32, behav: &str, operands: [&str; 3], out_name: &str) -> Result<String> {
    let width_generic = entity
        .generics
        .iter()
        .find(|g| g.eq_ignore_ascii_case("width"))
        .ok_or_else(|| CcError::VhdlParse("add8_3w entity has no `width` generic".into()))?;

    let out_port = entity
        .ports
        .iter()
        .find(|p| p.dir == PortDir::Out)
        .ok_or_else(|| CcError::VhdlParse("add8_3w entity has no output port".into()))?;
    let width_expr = out_port
        .width_expr
        .as_deref()
        .ok_or_else(|| CcError::VhdlParse("add8_3w output port is not a vector".into()))?;

    let mut generics = HashMap::new();
    generics.insert(width_generic.clone(), width_out as i64);
    let resolved = vhdl_parse::eval_expr(width_expr, &generics)?;
    if resolved != width_out as i64 - 1 {
        return Err(CcError::VhdlParse(format!(
            "add8_3w generic {width_generic}={width_out} resolves `{}` to index {resolved}, expected {}",
            out_port.name,
            width_out - 1
        )));
    }

    let in_ports: Vec<&str> = entity.ports.iter().filter(|p| p.dir == PortDir::In).map(|p| p.name.as_str()).collect();
    if in_ports.len() != operands.len() {
        return Err(CcError::VhdlParse(format!(
            "add8_3w entity declares {} input ports, expected {}",
            in_ports.len(),
            operands.len()
        )));
    }

    let port_map: Vec<String> = in_ports
        .iter()
        .zip(operands.iter())
        .map(|(port, operand)| format!("{port} => {operand}"))
        .chain(std::iter::once(format!("{} => {}", out_port.name, out_name)))
        .collect();

    Ok(format!(
        "ta_{out_name}: entity work.{}(behav_{behav})\ngeneric map ({width_generic} => {width_out})\nport map ({});",
        entity.name,
        port_map.join(", "),
    ))
}

fn block_statement(builder: &Builder, module: ModuleId, block: &Block) -> Result<String> {
    let m = builder.module(module);
    let sig = |id| m.signal(id);

    Ok(match block {
        Block::Add2 { a, b, out } => {
            let (a, b, out) = (sig(*a), sig(*b), sig(*out));
            format!(
                "{} <= std_logic_vector(signed({}) + signed({}));",
                write_name(out),
                read_name(a),
                read_name(b)
            )
        }
        Block::Sub2 { a, b, out } => {
            let (a, b, out) = (sig(*a), sig(*b), sig(*out));
            format!(
                "{} <= std_logic_vector(signed({}) - signed({}));",
                write_name(out),
                read_name(a),
                read_name(b)
            )
        }
        Block::Mult2 { a, b, out } => {
            let (a, b, out) = (sig(*a), sig(*b), sig(*out));
            format!(
                "{} <= std_logic_vector(signed({}) * signed({}));",
                write_name(out),
                read_name(a),
                read_name(b)
            )
        }
        Block::And2 { a, b, out } => {
            let (a, b, out) = (sig(*a), sig(*b), sig(*out));
            format!("{} <= {} and {};", write_name(out), read_name(a), read_name(b))
        }
        Block::Or2 { a, b, out } => {
            let (a, b, out) = (sig(*a), sig(*b), sig(*out));
            format!("{} <= {} or {};", write_name(out), read_name(a), read_name(b))
        }
        Block::Xor2 { a, b, out } => {
            let (a, b, out) = (sig(*a), sig(*b), sig(*out));
            format!("{} <= {} xor {};", write_name(out), read_name(a), read_name(b))
        }
        Block::Nand2 { a, b, out } => {
            let (a, b, out) = (sig(*a), sig(*b), sig(*out));
            format!("{} <= {} nand {};", write_name(out), read_name(a), read_name(b))
        }
        Block::Nor2 { a, b, out } => {
            let (a, b, out) = (sig(*a), sig(*b), sig(*out));
            format!("{} <= {} nor {};", write_name(out), read_name(a), read_name(b))
        }
        Block::Not { a, out } => {
            let (a, out) = (sig(*a), sig(*out));
            format!("{} <= not {};", write_name(out), read_name(a))
        }
        Block::Complement { a, out } => {
            let (a, out) = (sig(*a), sig(*out));
            format!(
                "{} <= std_logic_vector(- signed({}));",
                write_name(out),
                read_name(a)
            )
        }
        Block::Assign { src, dst } => {
            let (src, dst) = (sig(*src), sig(*dst));
            format!("{} <= {};", write_name(dst), read_name(src))
        }
        Block::Shift { a, positions, arith, out } => {
            let (a, out) = (sig(*a), sig(*out));
            let width_a = width_of(a)?;
            let width_out = width_of(out)?;
            let src = read_name(a);
            if *positions > 0 {
                let p = *positions as u32;
                format!(
                    "{} <= {};\n{} <= (others => '0');",
                    slice(&write_name(out), width_out, None, Some(p)),
                    slice(&src, width_a, Some(width_a - 1 - p), None),
                    slice(&write_name(out), width_out, Some(p - 1), None),
                )
            } else {
                let p = positions.unsigned_abs();
                let fill = if *arith {
                    slice(&src, width_a, Some(width_a - 1), Some(width_a - 1))
                } else {
                    "'0'".to_string()
                };
                format!(
                    "{} <= {};\n{} <= (others => {});",
                    slice(&write_name(out), width_out, Some(width_out - 1 - p), None),
                    slice(&src, width_a, None, Some(p)),
                    slice(&write_name(out), width_out, Some(p - 1), None),
                    fill,
                )
            }
        }
        Block::Extend { a, signed, out, .. } => {
            let (a, out) = (sig(*a), sig(*out));
            let width_a = width_of(a)?;
            let width_out = width_of(out)?;
            let fill = if *signed {
                slice(&read_name(a), width_a, Some(width_a - 1), Some(width_a - 1))
            } else {
                "'0'".to_string()
            };
            format!(
                "{} <= {};\n{} <= (others => {});",
                slice(&write_name(out), width_out, Some(width_a - 1), None),
                read_name(a),
                slice(&write_name(out), width_out, None, Some(width_a)),
                fill,
            )
        }
        Block::Shorten { a, lo_drop, out, .. } => {
            let (a, out) = (sig(*a), sig(*out));
            let width_a = width_of(a)?;
            let width_out = width_of(out)?;
            format!(
                "{} <= {};",
                write_name(out),
                slice(&read_name(a), width_a, Some(width_out + lo_drop - 1), Some(*lo_drop)),
            )
        }
        Block::TernaryAdd {
            a,
            b,
            c,
            sign_b,
            sign_c,
            out,
        } => {
            let (a, b, c, out) = (sig(*a), sig(*b), sig(*c), sig(*out));
            let width_out = width_of(out)?;
            let entity = vhdl_parse::add8_3w_entity()?;
            let (ra, rb, rc, wout) = (read_name(a), read_name(b), read_name(c), write_name(out));
            ternary_instance(&entity, width_out, ternary_behavior(*sign_b, *sign_c), [&ra, &rb, &rc], &wout)?
        }
        Block::ExternalInstance { child, port_map } => {
            let child_name = builder.module(*child).name.clone();
            let maps: Vec<String> = port_map
                .iter()
                .map(|(port_name, signal_id, dir)| {
                    let bound = sig(*signal_id);
                    let side = match dir {
                        PortDir::In => read_name(bound),
                        PortDir::Out => write_name(bound),
                    };
                    let prefix = match dir {
                        PortDir::In => "pin_",
                        PortDir::Out => "pout_",
                    };
                    format!("{prefix}{port_name} => {side}")
                })
                .collect();
            let label = port_map
                .iter()
                .find(|(_, _, dir)| *dir == PortDir::Out)
                .map(|(_, id, _)| sig(*id).name.clone())
                .unwrap_or_else(|| child_name.clone());
            format!(
                "inst_{label}: entity work.{child_name}\nport map ({}, clk => clk);",
                maps.join(", "),
            )
        }
    })
}

/// Writes `<out_dir>/<module name>.vhd`. `builder` must have already popped
/// `module` off its stack (`Builder::end_module`), so width inference and
/// port discovery are both settled.
pub fn emit_module(builder: &Builder, module: ModuleId, out_dir: &Path) -> Result<()> {
    let m = builder.module(module);
    debug!("emitting module `{}` ({} signals, {} blocks)", m.name, m.signals.len(), m.blocks.len());

    let ports = m.ports();
    let mut port_lines = Vec::new();
    let mut init_lines = Vec::new();

    for &(id, dir) in &ports {
        let signal = m.signal(id);
        let width = width_of(signal)?;
        match dir {
            PortDir::In => {
                port_lines.push(format!("pin_{} : in {}", signal.name, vector_type(width)));
                init_lines.push(format!("{} <= pin_{};", write_name(signal), signal.name));
            }
            PortDir::Out => {
                port_lines.push(format!("pout_{} : out {}", signal.name, vector_type(width)));
                init_lines.push(format!("pout_{} <= {};", signal.name, read_name(signal)));
            }
        }
    }
    port_lines.push("clk : in std_logic".to_string());

    let mut signal_decls = Vec::new();
    for signal in &m.signals {
        let width = width_of(signal)?;
        for stage in 0..=signal.buffer {
            signal_decls.push(format!(
                "signal {} : {};",
                stage_name(signal, stage),
                vector_type(width)
            ));
        }
    }

    for signal in &m.signals {
        if let Some(k) = signal.const_value {
            let width = width_of(signal)?;
            init_lines.push(format!(
                "{} <= {};",
                write_name(signal),
                twos_complement_literal(k, width)
            ));
        } else if let Some(src) = signal.alias_of {
            let src_signal = m.signal(src);
            init_lines.push(format!("{} <= {};", write_name(signal), read_name(src_signal)));
        }
    }

    let buffered: Vec<&Signal> = m.signals.iter().filter(|s| s.buffer > 0).collect();
    let mut sync_lines = Vec::new();
    if !buffered.is_empty() {
        sync_lines.push("sync: process(clk)".to_string());
        sync_lines.push("begin".to_string());
        sync_lines.push("if rising_edge(clk) then".to_string());
        for signal in &buffered {
            for stage in 1..=signal.buffer {
                sync_lines.push(format!(
                    "{} <= {};",
                    stage_name(signal, stage),
                    stage_name(signal, stage - 1)
                ));
            }
        }
        sync_lines.push("end if;".to_string());
        sync_lines.push("end process;".to_string());
    }

    let mut block_lines = Vec::new();
    for block in &m.blocks {
        block_lines.push(block_statement(builder, module, block)?);
    }

    let mut body = String::new();
    body.push_str(&init_lines.join("\n"));
    body.push('\n');
    if !sync_lines.is_empty() {
        body.push_str("\n------------\n-- REGISTERS\n------------\n\n");
        body.push_str(&sync_lines.join("\n"));
        body.push('\n');
    }
    body.push_str("\n---------\n-- BLOCKS\n---------\n\n");
    body.push_str(&block_lines.join("\n\n"));
    body.push('\n');

    let file = format!(
        "library IEEE;\nuse IEEE.std_logic_1164.ALL;\nuse IEEE.numeric_std.ALL;\n\n\
         entity {name} is\nport (\n  {ports}\n);\nend {name};\n\n\
         architecture beh of {name} is\n{decls}\nbegin\n{body}\nend beh;\n",
        name = m.name,
        ports = port_lines.join(";\n  "),
        decls = signal_decls.join("\n"),
        body = body,
    );

    fs::create_dir_all(out_dir)?;
    let path = out_dir.join(format!("{}.vhd", m.name));
    info!("writing {}", path.display());
    fs::write(path, file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csd::Sign;
    use crate::hir::Builder;

    #[test]
    fn ternary_add_resolves_against_the_real_entity() {
        let mut builder = Builder::new();
        builder.new_module("m");
        let a = builder.declare_input("a", 8).unwrap();
        let b = builder.declare_input("b", 8).unwrap();
        let c = builder.declare_input("c", 8).unwrap();
        let out = builder.add3(a, b, c, Sign::Pos, Sign::Neg).unwrap();
        let id = builder.end_module().unwrap();

        let dir = tempfile::tempdir().unwrap();
        emit_module(&builder, id, dir.path()).unwrap();
        let text = fs::read_to_string(dir.path().join("m.vhd")).unwrap();

        assert!(text.contains("entity work.add8_3w(behav_add_subw)"));
        assert!(text.contains("generic map (width => 8)"));
        let out_name = &builder.module(id).signal(out).name;
        assert!(text.contains(&format!("d => {out_name}")));
    }

    #[test]
    fn ternary_add_rejects_a_width_the_entity_cannot_resolve() {
        use super::vhdl_parse::ExternalPort;

        let in_port = |name: &str| ExternalPort {
            name: name.to_string(),
            dir: PortDir::In,
            width_expr: Some("width - 1".to_string()),
        };
        let entity = ExternalEntity {
            name: "broken".to_string(),
            generics: vec!["width".to_string()],
            ports: vec![
                in_port("a"),
                in_port("b"),
                in_port("c"),
                ExternalPort {
                    name: "d".to_string(),
                    dir: PortDir::Out,
                    width_expr: Some("width - 2".to_string()),
                },
            ],
        };
        let err = ternary_instance(&entity, 8, "add_addw", ["ra", "rb", "rc"], "rout").unwrap_err();
        assert!(matches!(err, CcError::VhdlParse(_)));
    }
}
