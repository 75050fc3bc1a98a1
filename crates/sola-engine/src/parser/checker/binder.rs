//! Declaration collection - builds the symbol table from an AST
//!
//! The binder walks the top-level declarations of a file and registers every
//! class, interface, enum, alias, new-type, function and global variable
//! before any expression is checked.

use super::symbols::{ClassSignature, FunctionSig, GenericParam, MethodSig, PropertySig, SymbolTable};
use crate::parser::ast::*;
use crate::parser::types::Type;

/// Binder - registers declarations into a [`SymbolTable`]
pub struct Binder<'a> {
    symbols: &'a mut SymbolTable,
}

impl<'a> Binder<'a> {
    pub fn new(symbols: &'a mut SymbolTable) -> Self {
        Binder { symbols }
    }

    /// Collect the declarations of the file being compiled. The file's
    /// namespace becomes the table's current namespace.
    pub fn bind_file(&mut self, file: &File) {
        self.symbols.set_namespace(file.namespace.clone());
        self.bind_declarations(file);
    }

    /// Collect the declarations of an imported file without changing the
    /// current namespace.
    pub fn bind_dependency(&mut self, file: &File) {
        let saved = self.symbols.namespace().map(str::to_string);
        self.symbols.set_namespace(file.namespace.clone());
        self.bind_declarations(file);
        self.symbols.set_namespace(saved);
    }

    fn bind_declarations(&mut self, file: &File) {
        for decl in &file.declarations {
            match decl {
                Declaration::Class(class) => self.bind_class(class),
                Declaration::Interface(iface) => self.bind_interface(iface),
                Declaration::Enum(e) => {
                    let name = self.symbols.qualify(&e.name);
                    self.symbols.add_enum(name, e.members.clone());
                }
                Declaration::TypeAlias(alias) => {
                    let name = self.symbols.qualify(&alias.name);
                    self.symbols.add_type_alias(name, Type::from_node(&alias.target));
                }
                Declaration::NewType(nt) => {
                    let name = self.symbols.qualify(&nt.name);
                    self.symbols.add_new_type(name, Type::from_node(&nt.base));
                }
            }
        }

        for stmt in &file.statements {
            match stmt {
                Statement::Function(func) => {
                    let name = self.symbols.qualify(&func.name);
                    let sig = function_signature(
                        &func.type_params,
                        &func.params,
                        func.return_type.as_ref(),
                        &[],
                    );
                    self.symbols.add_function(name, sig);
                }
                Statement::VarDecl(var) => {
                    // Inferred globals are refined by the checker
                    let ty = var.ty.as_ref().map(Type::from_node).unwrap_or(Type::Dynamic);
                    self.symbols.add_global(var.name.clone(), ty);
                }
                _ => {}
            }
        }
    }

    fn bind_class(&mut self, class: &ClassDecl) {
        let name = self.symbols.qualify(&class.name);
        let type_params = generic_params(&class.type_params, &class.where_clause);
        let param_names: Vec<String> = type_params.iter().map(|p| p.name.clone()).collect();

        self.symbols
            .add_class(name.clone(), ClassSignature { type_params }, class.is_final);

        if let Some(parent) = &class.parent {
            self.symbols.set_parent(&name, &parent.type_name());
        }
        if !class.interfaces.is_empty() {
            self.symbols.add_interfaces(&name, class.interfaces.clone());
        }

        for prop in &class.properties {
            let ty = prop
                .ty
                .as_ref()
                .map(|t| Type::from_node_with(t, &param_names))
                .unwrap_or(Type::Dynamic);
            self.symbols.add_property(
                &name,
                prop.name.clone(),
                PropertySig {
                    ty,
                    is_static: prop.is_static,
                },
            );
        }

        for method in &class.methods {
            self.symbols.add_method(&name, method_signature(method, &param_names));
        }
    }

    fn bind_interface(&mut self, iface: &InterfaceDecl) {
        let name = self.symbols.qualify(&iface.name);
        let type_params = generic_params(&iface.type_params, &[]);
        let param_names: Vec<String> = type_params.iter().map(|p| p.name.clone()).collect();

        self.symbols
            .add_interface(name.clone(), ClassSignature { type_params });
        if !iface.parents.is_empty() {
            self.symbols.add_interfaces(&name, iface.parents.clone());
        }
        for method in &iface.methods {
            self.symbols.add_method(&name, method_signature(method, &param_names));
        }
    }
}

/// Merge a parameter list with the bounds of a `where` clause
pub fn generic_params(params: &[TypeParam], where_clause: &[TypeParam]) -> Vec<GenericParam> {
    let mut out: Vec<GenericParam> = params.iter().map(generic_param).collect();
    for bound in where_clause {
        match out.iter_mut().find(|p| p.name == bound.name) {
            Some(existing) => {
                if bound.extends.is_some() {
                    existing.extends = bound.extends.clone();
                }
                existing.implements.extend(bound.implements.iter().cloned());
            }
            None => out.push(generic_param(bound)),
        }
    }
    out
}

fn generic_param(param: &TypeParam) -> GenericParam {
    GenericParam {
        name: param.name.clone(),
        extends: param.extends.clone(),
        implements: param.implements.clone(),
    }
}

/// Build a signature from a parameter list. Missing parameter types default
/// to `dynamic`, a missing return type to `void`.
pub fn function_signature(
    type_params: &[TypeParam],
    params: &[Param],
    return_type: Option<&TypeNode>,
    outer_params: &[String],
) -> FunctionSig {
    let generics = generic_params(type_params, &[]);
    let mut names: Vec<String> = outer_params.to_vec();
    names.extend(generics.iter().map(|p| p.name.clone()));

    FunctionSig {
        param_names: params.iter().map(|p| p.name.clone()).collect(),
        param_types: params
            .iter()
            .map(|p| {
                p.ty.as_ref()
                    .map(|t| Type::from_node_with(t, &names))
                    .unwrap_or(Type::Dynamic)
            })
            .collect(),
        return_type: return_type
            .map(|t| Type::from_node_with(t, &names))
            .unwrap_or(Type::Void),
        min_arity: min_arity(params),
        is_variadic: params.last().map_or(false, |p| p.variadic),
        type_params: generics,
    }
}

fn method_signature(method: &MethodDecl, class_params: &[String]) -> MethodSig {
    MethodSig {
        name: method.name.clone(),
        signature: function_signature(
            &method.type_params,
            &method.params,
            method.return_type.as_ref(),
            class_params,
        ),
        is_static: method.is_static,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Pos {
        Pos::new("test.sola", 1, 1)
    }

    fn class(name: &str) -> ClassDecl {
        ClassDecl {
            name: name.into(),
            type_params: vec![],
            where_clause: vec![],
            parent: None,
            interfaces: vec![],
            is_final: false,
            properties: vec![],
            methods: vec![],
            pos: pos(),
        }
    }

    fn method(name: &str, params: Vec<Param>, ret: Option<TypeNode>) -> MethodDecl {
        MethodDecl {
            name: name.into(),
            type_params: vec![],
            params,
            return_type: ret,
            body: Some(vec![]),
            is_static: false,
            pos: pos(),
        }
    }

    #[test]
    fn test_bind_class_with_namespace_and_generic_parent() {
        let mut file = File::new("test.sola");
        file.namespace = Some("App".into());
        let mut dog = class("Dog");
        dog.parent = Some(TypeNode::Generic {
            base: "Animal".into(),
            args: vec![TypeNode::simple("int")],
        });
        let mut param = Param::new("n", Some(TypeNode::simple("int")), pos());
        param.default = Some(Expression::int(1, pos()));
        dog.methods.push(method(
            "bark",
            vec![Param::new("loud", None, pos()), param],
            None,
        ));
        file.declarations.push(Declaration::Class(class("Animal")));
        file.declarations.push(Declaration::Class(dog));

        let mut symbols = SymbolTable::standalone();
        Binder::new(&mut symbols).bind_file(&file);

        assert!(symbols.class_exists("App\\Dog"));
        assert_eq!(symbols.parent_of("App\\Dog"), Some("Animal"));
        let bark = symbols.get_method("Dog", "bark", 1).unwrap();
        assert_eq!(bark.signature.min_arity, 1);
        assert_eq!(bark.signature.param_names, vec!["loud", "n"]);
        assert_eq!(bark.signature.param_types[0], Type::Dynamic);
        assert_eq!(bark.signature.return_type, Type::Void);
    }

    #[test]
    fn test_where_clause_bounds_merge() {
        let mut t = TypeParam::new("T", pos());
        t.implements.push("Countable".into());
        let mut bound = TypeParam::new("T", pos());
        bound.extends = Some("Base".into());
        let mut extra = TypeParam::new("U", pos());
        extra.extends = Some("Other".into());

        let params = generic_params(&[t], &[bound, extra]);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].extends.as_deref(), Some("Base"));
        assert_eq!(params[0].implements, vec!["Countable"]);
        assert_eq!(params[1].name, "U");
    }

    #[test]
    fn test_bind_functions_enums_aliases_and_globals() {
        let mut file = File::new("test.sola");
        file.declarations.push(Declaration::Enum(EnumDecl {
            name: "Colour".into(),
            members: vec!["Red".into(), "Green".into()],
            pos: pos(),
        }));
        file.declarations.push(Declaration::TypeAlias(TypeAliasDecl {
            name: "Name".into(),
            target: TypeNode::simple("string"),
            pos: pos(),
        }));
        file.declarations.push(Declaration::NewType(NewTypeDecl {
            name: "UserId".into(),
            base: TypeNode::simple("int"),
            pos: pos(),
        }));
        let mut variadic = Param::new("rest", Some(TypeNode::simple("int")), pos());
        variadic.variadic = true;
        file.statements.push(Statement::Function(FunctionDecl {
            name: "sum".into(),
            type_params: vec![],
            params: vec![variadic],
            return_type: Some(TypeNode::simple("int")),
            body: vec![],
            pos: pos(),
        }));
        file.statements.push(Statement::VarDecl(VarDecl::new(
            "limit",
            Some(TypeNode::simple("int")),
            None,
            pos(),
        )));

        let mut symbols = SymbolTable::standalone();
        Binder::new(&mut symbols).bind_file(&file);

        assert_eq!(symbols.enum_members("Colour").unwrap().len(), 2);
        assert_eq!(symbols.resolve_alias(&Type::named("Name")), Type::String);
        assert!(symbols.is_new_type("UserId"));
        let sum = symbols.function("sum").unwrap();
        assert!(sum.is_variadic);
        assert_eq!(sum.min_arity, 0);
        assert_eq!(symbols.global("limit"), Some(&Type::Int));
    }

    #[test]
    fn test_bind_dependency_restores_namespace() {
        let mut dep = File::new("lib.sola");
        dep.namespace = Some("Lib".into());
        dep.declarations.push(Declaration::Class(class("Helper")));

        let mut symbols = SymbolTable::standalone();
        symbols.set_namespace(Some("App".into()));
        Binder::new(&mut symbols).bind_dependency(&dep);
        assert_eq!(symbols.namespace(), Some("App"));
        assert!(symbols.class_exists("Lib\\Helper"));
        assert!(symbols.class_exists("Helper"));
    }
}
