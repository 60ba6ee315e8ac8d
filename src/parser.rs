//! Turns the token stream into a forest of command trees.
//!
//! Commands separated by stops (and the heads of `&&`/`||` chains) become
//! roots of the forest. Pipes fuse adjacent commands by installing the two
//! ends of a fresh pipe and backgrounding the producer. Redirections open
//! the target through the stream layer and install the handle into the
//! affected slot; `2>&1` and `1>&2` alias the slots themselves.

use std::mem;
use std::sync::Arc;

use log::debug;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind};
use crate::pipe;
use crate::provider::IoProvider;
use crate::stream::{self, MemReader};

#[derive(Clone, Copy)]
enum Link {
    And,
    Or,
}

struct Chain {
    // finished chain nodes, each with the link that connects it to its
    // successor
    nodes: Vec<(Command, Link)>,
    // the current command is the chain's tail
    open: bool,
    // a chain restarted after its head already joined the forest can never
    // join it again; build it for stream-wiring consistency, then drop it
    discard: bool,
}

struct Forest<'a> {
    iop: &'a Arc<IoProvider>,
    commands: Vec<Command>,
    current: Command,
    chain: Option<Chain>,
}

impl<'a> Forest<'a> {
    fn new(iop: &'a Arc<IoProvider>) -> Forest<'a> {
        Forest {
            iop,
            commands: Vec::new(),
            current: Command::new(iop),
            chain: None,
        }
    }

    fn take_current(&mut self) -> Command {
        mem::replace(&mut self.current, Command::new(self.iop))
    }

    // Finish the current command: append it to the forest, or fold it into
    // the pending chain as that chain's tail. Commands that never received
    // an executable (a stray `&`, a stop right after a redirection) are
    // dropped rather than queued as guaranteed failures.
    fn finalize(&mut self) {
        let finished = self.take_current();
        match &mut self.chain {
            None => {
                if !finished.executable.is_empty() {
                    self.commands.push(finished);
                }
            }
            Some(chain) if chain.open => {
                chain.open = false;
                let head = fold_chain(mem::take(&mut chain.nodes), finished);
                if !chain.discard {
                    self.commands.push(head);
                }
            }
            // the chain was already sealed; this command has nowhere to go
            Some(_) => {}
        }
    }

    fn stop(&mut self) {
        self.finalize();
        self.chain = None;
    }

    fn link(&mut self, link: Link) {
        let node = self.take_current();
        match &mut self.chain {
            None => {
                self.chain = Some(Chain {
                    nodes: vec![(node, link)],
                    open: true,
                    discard: false,
                });
            }
            Some(chain) if chain.open => chain.nodes.push((node, link)),
            Some(chain) => {
                *chain = Chain {
                    nodes: vec![(node, link)],
                    open: true,
                    discard: true,
                };
            }
        }
    }

    fn finish(mut self) -> Vec<Command> {
        match self.chain.take() {
            Some(chain) if chain.open => {
                let tail = self.take_current();
                let head = fold_chain(chain.nodes, tail);
                if !chain.discard {
                    self.commands.push(head);
                }
            }
            Some(_) => {}
            None => {
                if !self.current.executable.is_empty() {
                    let last = self.take_current();
                    self.commands.push(last);
                }
            }
        }
        self.commands
    }
}

// Nest a flat chain into its head command: a, &&, b, ||, c becomes
// a { and: b { or: c } }.
fn fold_chain(nodes: Vec<(Command, Link)>, tail: Command) -> Command {
    let mut node = tail;
    for (mut cmd, link) in nodes.into_iter().rev() {
        match link {
            Link::And => cmd.and = Some(Box::new(node)),
            Link::Or => cmd.or = Some(Box::new(node)),
        }
        node = cmd;
    }
    node
}

// The identifier following a redirection operator.
fn redirect_target<'t>(text: &str, tokens: &'t [Token], i: usize) -> Result<&'t Token> {
    let token = &tokens[i];
    match tokens.get(i + 1) {
        None => Err(Error::parser(
            token.index,
            text,
            "unexpected end of input after redirect",
        )),
        Some(target) if target.kind == TokenKind::Identifier => Ok(target),
        Some(_) => Err(Error::parser(
            token.index,
            text,
            "expected identifier after redirect",
        )),
    }
}

/// Parse `tokens` into a forest of command trees. `text` is the original
/// source, used for error positions.
pub fn parse(text: &str, tokens: &[Token], iop: &Arc<IoProvider>) -> Result<Vec<Command>> {
    let mut forest = Forest::new(iop);

    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        match token.kind {
            TokenKind::Identifier => {
                if forest.current.executable.is_empty() {
                    forest.current.executable = token.content.clone();
                } else {
                    forest.current.arguments.push(token.content.clone());
                }
            }

            TokenKind::Stop => forest.stop(),

            TokenKind::Background => {
                forest.current.background = true;
                forest.finalize();
            }

            TokenKind::Pipe => {
                if i + 1 >= tokens.len() {
                    return Err(Error::parser(
                        token.index,
                        text,
                        "unexpected end of input after pipe",
                    ));
                }
                // Pipe ends stay out of the closer: the provider's closer
                // runs after every top-level command, which would sever
                // later pipeline stages mid-flight. The executor closes the
                // producer's stdout instead, which is what delivers EOF.
                let (w, r) = pipe::new_pipe();
                forest.current.set_stdout(w);
                forest.current.background = true;
                forest.finalize();
                forest.current.set_stdin(r);
            }

            TokenKind::RedirOut | TokenKind::RedirErr | TokenKind::RedirBoth => {
                let target = redirect_target(text, tokens, i)?;
                let w = stream::open_writer(&iop.closer, &target.content)
                    .map_err(|e| Error::parser(target.index, text, e.to_string()))?;
                match token.kind {
                    TokenKind::RedirOut => forest.current.set_stdout(w),
                    TokenKind::RedirErr => forest.current.set_stderr(w),
                    _ => {
                        forest.current.set_stdout(w.clone());
                        forest.current.set_stderr(w);
                    }
                }
                i += 1;
                forest.finalize();
            }

            TokenKind::RedirAppendOut | TokenKind::RedirAppendErr | TokenKind::RedirAppendBoth => {
                let target = redirect_target(text, tokens, i)?;
                let w = stream::open_append_writer(&iop.closer, &target.content)
                    .map_err(|e| Error::parser(target.index, text, e.to_string()))?;
                match token.kind {
                    TokenKind::RedirAppendOut => forest.current.set_stdout(w),
                    TokenKind::RedirAppendErr => forest.current.set_stderr(w),
                    _ => {
                        forest.current.set_stdout(w.clone());
                        forest.current.set_stderr(w);
                    }
                }
                i += 1;
                forest.finalize();
            }

            TokenKind::ErrToOut => {
                forest.current.stderr = Arc::clone(&forest.current.stdout);
            }

            TokenKind::OutToErr => {
                forest.current.stdout = Arc::clone(&forest.current.stderr);
            }

            TokenKind::RedirIn => {
                let target = redirect_target(text, tokens, i)?;
                let r = stream::open_reader(&iop.closer, &target.content)
                    .map_err(|e| Error::parser(target.index, text, e.to_string()))?;
                forest.current.set_stdin(r);
                i += 1;
            }

            TokenKind::HereDoc => {
                forest
                    .current
                    .set_stdin(Arc::new(MemReader::new(token.content.as_bytes())));
                forest.finalize();
            }

            TokenKind::And => {
                if i + 1 >= tokens.len() {
                    return Err(Error::parser(
                        token.index,
                        text,
                        "unexpected end of input after and",
                    ));
                }
                forest.link(Link::And);
            }

            TokenKind::Or => {
                if i + 1 >= tokens.len() {
                    return Err(Error::parser(
                        token.index,
                        text,
                        "unexpected end of input after or",
                    ));
                }
                forest.link(Link::Or);
            }
        }
        i += 1;
    }

    let commands = forest.finish();
    debug!("parsed {} top-level commands", commands.len());
    Ok(commands)
}
