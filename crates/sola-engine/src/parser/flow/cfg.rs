//! Control-flow graph construction
//!
//! Lowers one function body into basic blocks. Simple statements are kept
//! whole; compound statements contribute their conditions as expression items
//! and their bodies as separate blocks. Statements after an unconditional
//! transfer land in a block with no predecessors.

use rustc_hash::FxHashSet;

use crate::parser::ast::*;

pub type BlockId = usize;

/// One evaluated unit inside a block
#[derive(Debug, Clone, Copy)]
pub enum CfgItem<'a> {
    /// A statement without nested control flow
    Stmt(&'a Statement),
    /// A condition, subject, iterable or loop update
    Expr(&'a Expression),
    /// Variables bound by a `foreach` head or a `catch` clause
    Bind(&'a [String], Option<&'a str>, &'a Pos),
}

impl<'a> CfgItem<'a> {
    pub fn pos(&self) -> &'a Pos {
        match self {
            CfgItem::Stmt(s) => s.pos(),
            CfgItem::Expr(e) => e.pos(),
            CfgItem::Bind(_, _, pos) => pos,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BasicBlock<'a> {
    pub id: BlockId,
    pub items: Vec<CfgItem<'a>>,
    pub successors: Vec<BlockId>,
    pub predecessors: Vec<BlockId>,
    /// Variables assigned somewhere in the block (`Gen`)
    pub vars_defined: FxHashSet<String>,
    pub vars_live_in: FxHashSet<String>,
    pub vars_live_out: FxHashSet<String>,
    /// Ends in `return` or `throw`
    pub has_return: bool,
}

#[derive(Debug, Clone)]
pub struct Cfg<'a> {
    pub blocks: Vec<BasicBlock<'a>>,
    pub entry: BlockId,
    pub exit: BlockId,
}

impl<'a> Cfg<'a> {
    /// Build the graph for a function body
    pub fn build(body: &'a [Statement]) -> Self {
        let mut builder = CfgBuilder::new();
        builder.lower_block(body);
        let (current, exit) = (builder.current, builder.exit);
        builder.edge(current, exit);
        Cfg {
            blocks: builder.blocks,
            entry: 0,
            exit,
        }
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock<'a> {
        &self.blocks[id]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

struct JumpTargets {
    break_to: BlockId,
    /// `None` for `switch`, which only captures `break`
    continue_to: Option<BlockId>,
}

struct CfgBuilder<'a> {
    blocks: Vec<BasicBlock<'a>>,
    current: BlockId,
    exit: BlockId,
    targets: Vec<JumpTargets>,
}

/// `while (true)` and `for (;;)` have no exit edge besides `break`
fn is_const_true(expr: Option<&Expression>) -> bool {
    match expr {
        None => true,
        Some(Expression::BoolLiteral(b)) => b.value,
        Some(_) => false,
    }
}

impl<'a> CfgBuilder<'a> {
    fn new() -> Self {
        let mut builder = CfgBuilder {
            blocks: Vec::new(),
            current: 0,
            exit: 0,
            targets: Vec::new(),
        };
        let entry = builder.new_block();
        builder.exit = builder.new_block();
        builder.current = entry;
        builder
    }

    fn new_block(&mut self) -> BlockId {
        let id = self.blocks.len();
        self.blocks.push(BasicBlock {
            id,
            ..BasicBlock::default()
        });
        id
    }

    fn edge(&mut self, from: BlockId, to: BlockId) {
        if !self.blocks[from].successors.contains(&to) {
            self.blocks[from].successors.push(to);
            self.blocks[to].predecessors.push(from);
        }
    }

    fn push(&mut self, item: CfgItem<'a>) {
        let current = self.current;
        self.blocks[current].items.push(item);
    }

    /// Continue in a fresh block that nothing jumps to
    fn detach(&mut self) {
        self.current = self.new_block();
    }

    fn lower_block(&mut self, stmts: &'a [Statement]) {
        for stmt in stmts {
            self.lower_statement(stmt);
        }
    }

    fn lower_statement(&mut self, stmt: &'a Statement) {
        match stmt {
            Statement::Expression(_)
            | Statement::VarDecl(_)
            | Statement::MultiAssign(_)
            | Statement::Echo(_)
            | Statement::Unset(_)
            | Statement::Function(_) => self.push(CfgItem::Stmt(stmt)),

            Statement::Return(_) | Statement::Throw(_) => {
                self.push(CfgItem::Stmt(stmt));
                let (current, exit) = (self.current, self.exit);
                self.blocks[current].has_return = true;
                self.edge(current, exit);
                self.detach();
            }

            Statement::Break(_) => {
                if let Some(target) = self.targets.last().map(|t| t.break_to) {
                    self.edge(self.current, target);
                }
                self.detach();
            }

            Statement::Continue(_) => {
                if let Some(target) = self.targets.iter().rev().find_map(|t| t.continue_to) {
                    self.edge(self.current, target);
                }
                self.detach();
            }

            Statement::Block(b) => self.lower_block(&b.body),

            Statement::If(s) => self.lower_if(s),
            Statement::While(s) => self.lower_while(s),
            Statement::For(s) => self.lower_for(s),
            Statement::Foreach(s) => self.lower_foreach(s),
            Statement::Switch(s) => self.lower_switch(s),
            Statement::Try(s) => self.lower_try(s),
        }
    }

    /// Lower `body` in a new block entered from `from`; returns the block
    /// control is in afterwards.
    fn lower_branch(&mut self, from: BlockId, body: &'a [Statement]) -> BlockId {
        let block = self.new_block();
        self.edge(from, block);
        self.current = block;
        self.lower_block(body);
        self.current
    }

    fn lower_if(&mut self, s: &'a IfStmt) {
        self.push(CfgItem::Expr(&s.condition));
        let mut cond_block = self.current;
        let join = self.new_block();

        let end = self.lower_branch(cond_block, &s.then_branch);
        self.edge(end, join);

        for elif in &s.else_ifs {
            let elif_block = self.new_block();
            self.edge(cond_block, elif_block);
            self.current = elif_block;
            self.push(CfgItem::Expr(&elif.condition));
            cond_block = elif_block;
            let end = self.lower_branch(cond_block, &elif.body);
            self.edge(end, join);
        }

        match &s.else_branch {
            Some(else_branch) => {
                let end = self.lower_branch(cond_block, else_branch);
                self.edge(end, join);
            }
            None => self.edge(cond_block, join),
        }
        self.current = join;
    }

    fn lower_while(&mut self, s: &'a WhileStmt) {
        let header = self.new_block();
        self.edge(self.current, header);
        self.current = header;
        self.push(CfgItem::Expr(&s.condition));

        let exit = self.new_block();
        if !is_const_true(Some(&s.condition)) {
            self.edge(header, exit);
        }
        self.targets.push(JumpTargets {
            break_to: exit,
            continue_to: Some(header),
        });
        let end = self.lower_branch(header, &s.body);
        self.edge(end, header);
        self.targets.pop();
        self.current = exit;
    }

    fn lower_for(&mut self, s: &'a ForStmt) {
        if let Some(init) = &s.init {
            self.lower_statement(init);
        }
        let header = self.new_block();
        self.edge(self.current, header);
        self.current = header;
        if let Some(cond) = &s.condition {
            self.push(CfgItem::Expr(cond));
        }

        let update = self.new_block();
        let exit = self.new_block();
        if !is_const_true(s.condition.as_ref()) {
            self.edge(header, exit);
        }
        self.targets.push(JumpTargets {
            break_to: exit,
            continue_to: Some(update),
        });
        let end = self.lower_branch(header, &s.body);
        self.targets.pop();

        self.edge(end, update);
        self.current = update;
        if let Some(step) = &s.update {
            self.push(CfgItem::Expr(step));
        }
        self.edge(update, header);
        self.current = exit;
    }

    fn lower_foreach(&mut self, s: &'a ForeachStmt) {
        self.push(CfgItem::Expr(&s.iterable));
        let header = self.new_block();
        self.edge(self.current, header);
        let exit = self.new_block();
        self.edge(header, exit);

        let body = self.new_block();
        self.edge(header, body);
        self.current = body;
        self.push(CfgItem::Bind(
            std::slice::from_ref(&s.value),
            s.key.as_deref(),
            &s.pos,
        ));
        self.targets.push(JumpTargets {
            break_to: exit,
            continue_to: Some(header),
        });
        self.lower_block(&s.body);
        self.targets.pop();
        self.edge(self.current, header);
        self.current = exit;
    }

    fn lower_switch(&mut self, s: &'a SwitchStmt) {
        self.push(CfgItem::Expr(&s.subject));
        for case in &s.cases {
            self.push(CfgItem::Expr(&case.value));
        }
        let dispatch = self.current;
        let exit = self.new_block();
        self.targets.push(JumpTargets {
            break_to: exit,
            continue_to: None,
        });
        for case in &s.cases {
            let end = self.lower_branch(dispatch, &case.body);
            self.edge(end, exit);
        }
        match &s.default {
            Some(default) => {
                let end = self.lower_branch(dispatch, default);
                self.edge(end, exit);
            }
            None => self.edge(dispatch, exit),
        }
        self.targets.pop();
        self.current = exit;
    }

    fn lower_try(&mut self, s: &'a TryStmt) {
        let try_start = self.new_block();
        self.edge(self.current, try_start);
        self.current = try_start;
        self.lower_block(&s.body);
        let try_end = self.current;

        let after = self.new_block();
        let landing = match &s.finally {
            Some(_) => self.new_block(),
            None => after,
        };
        self.edge(try_end, landing);

        for catch in &s.catches {
            // A throw may happen before anything in the try body ran
            let block = self.new_block();
            self.edge(try_start, block);
            self.current = block;
            if let Some(var) = &catch.var {
                self.push(CfgItem::Bind(&[], Some(var.as_str()), &catch.pos));
            }
            self.lower_block(&catch.body);
            self.edge(self.current, landing);
        }

        if let Some(finally) = &s.finally {
            self.current = landing;
            self.lower_block(finally);
            self.edge(self.current, after);
        }
        self.current = after;
    }
}
