//! Compile the template into a program that can be executed by the renderer.
//!
//! This process has three stages:
//! - The lexer chunks the template source into tokens.
//! - The parser constructs an AST from the token stream, handing custom
//!   blocks to the registered tag parsers.
//! - The compiler takes the AST and constructs the program.

mod lex;
mod parse;
pub(crate) mod stream;

use std::collections::BTreeMap;

use crate::tags::{Node, TagParser};
use crate::types::ast;
use crate::types::program::{Instr, Template, FIXME};
use crate::Result;

/// The name of the filter that disables escaping.
const RAW: &str = "raw";

/// Filters whose output is already escaped.
const ESCAPERS: &[&str] = &["escape", "e"];

/// Block names handled by the parser itself.
pub(crate) const BUILTIN_TAGS: &[&str] = &[
    "if", "elseif", "else", "endif", "for", "endfor", "include",
];

/// Compile a template into a program.
pub fn template(source: String, tags: &BTreeMap<String, Box<dyn TagParser>>) -> Result<Template> {
    let ast = parse::Parser::new(&source, tags).parse_template()?;
    Ok(Compiler::new().compile_template(source, ast))
}

/// A compiler that constructs a program from an AST.
struct Compiler {
    instrs: Vec<Instr>,
}

impl Compiler {
    fn new() -> Self {
        Self { instrs: Vec::new() }
    }

    fn compile_template(mut self, source: String, template: ast::Template) -> Template {
        self.compile_scope(template.scope);
        Template {
            source,
            instrs: self.instrs,
        }
    }

    fn compile_scope(&mut self, scope: ast::Scope) {
        for stmt in scope.stmts {
            self.compile_stmt(stmt);
        }
    }

    fn compile_stmt(&mut self, stmt: ast::Stmt) {
        match stmt {
            ast::Stmt::Raw(raw) => {
                self.push(Instr::EmitRaw(raw));
            }

            ast::Stmt::InlineExpr(ast::InlineExpr { expr, .. }) => {
                let span = expr.span();
                match expr {
                    ast::Expr::Filter(filter) if is_raw(&filter) => {
                        self.compile_expr(*filter.receiver);
                        self.push(Instr::EmitSafe(span));
                    }
                    ast::Expr::Filter(filter) if ESCAPERS.contains(&filter.name.name.as_str()) => {
                        self.compile_expr(ast::Expr::Filter(filter));
                        self.push(Instr::EmitSafe(span));
                    }
                    expr => {
                        self.compile_expr(expr);
                        self.push(Instr::Emit(span));
                    }
                }
            }

            ast::Stmt::Include(ast::Include { name, globals }) => match globals {
                Some(globals) => {
                    self.compile_expr(globals);
                    self.push(Instr::IncludeWith(name));
                }
                None => {
                    self.push(Instr::Include(name));
                }
            },

            ast::Stmt::IfElse(ast::IfElse {
                not,
                cond,
                then_branch,
                else_branch,
            }) => {
                self.compile_expr(cond);

                // then branch
                let instr = if not {
                    Instr::JumpIfTrue(FIXME)
                } else {
                    Instr::JumpIfFalse(FIXME)
                };
                let j = self.push(instr);
                self.compile_scope(then_branch);

                match else_branch {
                    Some(else_branch) => {
                        // else branch
                        let j2 = self.push(Instr::Jump(FIXME));
                        self.update_jump(j);
                        self.compile_scope(else_branch);
                        self.update_jump(j2)
                    }
                    None => {
                        self.update_jump(j);
                    }
                }
            }

            ast::Stmt::ForLoop(ast::ForLoop {
                vars,
                iterable,
                body,
            }) => {
                let span = iterable.span();
                self.compile_expr(iterable);
                self.push(Instr::LoopStart(vars, span));
                let j = self.push(Instr::LoopNext(FIXME));
                self.compile_scope(body);
                self.push(Instr::Jump(j));
                self.update_jump(j);
            }

            ast::Stmt::Tag(ast::Tag { node, span }) => match node {
                Node::Text(text) => {
                    self.push(Instr::EmitText(text));
                }
                Node::Invoke(invoke) => {
                    self.push(Instr::Invoke(invoke, span));
                }
            },
        }
    }

    fn compile_expr(&mut self, expr: ast::Expr) {
        match expr {
            ast::Expr::Base(base) => self.compile_base_expr(base),

            // `raw` only affects escaping, elsewhere it passes the value on.
            ast::Expr::Filter(filter) if is_raw(&filter) => {
                self.compile_expr(*filter.receiver);
            }

            ast::Expr::Filter(ast::Filter {
                name,
                args,
                receiver,
                ..
            }) => {
                let argc = args.len() + 1;
                self.compile_expr(*receiver);
                for arg in args {
                    self.compile_expr(arg);
                }
                self.push(Instr::Call(name, argc));
            }
        }
    }

    fn compile_base_expr(&mut self, base: ast::BaseExpr) {
        match base {
            ast::BaseExpr::Var(var) => {
                self.push(Instr::ExprStart(var));
            }

            ast::BaseExpr::Literal(ast::Literal { value, .. }) => {
                self.push(Instr::ExprStartLit(value));
            }

            ast::BaseExpr::Call(ast::Call { name, args, .. }) => {
                let argc = args.len();
                for arg in args {
                    self.compile_expr(arg);
                }
                self.push(Instr::Call(name, argc));
            }

            ast::BaseExpr::List(ast::List { items, .. }) => {
                let n = items.len();
                for item in items {
                    self.compile_expr(item);
                }
                self.push(Instr::MakeList(n));
            }

            ast::BaseExpr::Map(ast::Map { entries, .. }) => {
                let mut keys = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    self.compile_expr(value);
                    keys.push(key);
                }
                self.push(Instr::MakeMap(keys));
            }
        }
    }

    fn update_jump(&mut self, i: usize) {
        let n = self.instrs.len();
        let j = match &mut self.instrs[i] {
            Instr::Jump(j) | Instr::JumpIfTrue(j) | Instr::JumpIfFalse(j) | Instr::LoopNext(j) => j,
            _ => panic!("not a jump instr"),
        };
        *j = n;
    }

    fn push(&mut self, instr: Instr) -> usize {
        let i = self.instrs.len();
        self.instrs.push(instr);
        i
    }
}

fn is_raw(filter: &ast::Filter) -> bool {
    filter.name.name == RAW && filter.args.is_empty()
}
