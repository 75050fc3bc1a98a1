//! Generic substitution and type-argument inference

use rustc_hash::FxHashMap;

use super::ty::Type;

/// Type parameter name → bound type
pub type Substitution = FxHashMap<String, Type>;

/// Replace every bound type parameter occurring in `ty`
pub fn substitute(ty: &Type, subst: &Substitution) -> Type {
    if subst.is_empty() {
        return ty.clone();
    }
    match ty {
        Type::Param(name) => subst.get(name).cloned().unwrap_or_else(|| ty.clone()),
        Type::Array(el) => Type::array(substitute(el, subst)),
        Type::FixedArray(el, n) => Type::FixedArray(Box::new(substitute(el, subst)), *n),
        Type::Map(k, v) => Type::map(substitute(k, subst), substitute(v, subst)),
        Type::Tuple(members) => Type::Tuple(members.iter().map(|m| substitute(m, subst)).collect()),
        Type::Union(members) => Type::union(members.iter().map(|m| substitute(m, subst))),
        Type::Func { params, ret } => Type::func(
            params.iter().map(|p| substitute(p, subst)).collect(),
            substitute(ret, subst),
        ),
        Type::Generic { base, args } => Type::Generic {
            base: base.clone(),
            args: args.iter().map(|a| substitute(a, subst)).collect(),
        },
        other => other.clone(),
    }
}

/// Bind the type parameters of `pattern` by structural matching against
/// `actual`. The first binding of a parameter wins.
pub fn unify(pattern: &Type, actual: &Type, subst: &mut Substitution) {
    if actual.is_error() {
        return;
    }
    match (pattern, actual) {
        (Type::Param(name), _) => {
            subst.entry(name.clone()).or_insert_with(|| actual.clone());
        }
        (Type::Array(p), Type::Array(a)) | (Type::Array(p), Type::FixedArray(a, _)) => {
            unify(p, a, subst)
        }
        (Type::FixedArray(p, _), Type::FixedArray(a, _)) => unify(p, a, subst),
        (Type::Map(pk, pv), Type::Map(ak, av)) => {
            unify(pk, ak, subst);
            unify(pv, av, subst);
        }
        (Type::Tuple(ps), Type::Tuple(as_)) => {
            for (p, a) in ps.iter().zip(as_) {
                unify(p, a, subst);
            }
        }
        (Type::Generic { base: pb, args: pa }, Type::Generic { base: ab, args: aa }) if pb == ab => {
            for (p, a) in pa.iter().zip(aa) {
                unify(p, a, subst);
            }
        }
        (Type::Func { params: pp, ret: pr }, Type::Func { params: ap, ret: ar }) => {
            for (p, a) in pp.iter().zip(ap) {
                unify(p, a, subst);
            }
            unify(pr, ar, subst);
        }
        (Type::Union(ps), _) => {
            // `T|null` against `int` binds T to int
            let actual_members: Vec<&Type> = match actual {
                Type::Union(ms) => ms.iter().filter(|m| !ps.contains(m)).collect(),
                other => vec![other],
            };
            let open: Vec<&Type> = ps.iter().filter(|p| p.has_params()).collect();
            if let ([p], [a]) = (open.as_slice(), actual_members.as_slice()) {
                unify(p, a, subst);
            }
        }
        _ => {}
    }
}

/// Infer bindings for a generic call from argument types
pub fn infer_type_args(params: &[Type], args: &[Type]) -> Substitution {
    let mut subst = Substitution::default();
    for (param, arg) in params.iter().zip(args) {
        unify(param, arg, &mut subst);
    }
    subst
}

/// Bind a class's declared parameters to explicit arguments: `Box<T>` with `<int>`
pub fn bind_params(names: &[String], args: &[Type]) -> Substitution {
    names.iter().cloned().zip(args.iter().cloned()).collect()
}

/// Generic arguments carried by a type (`Box<int>` → `[int]`)
pub fn type_args(ty: &Type) -> &[Type] {
    match ty {
        Type::Generic { args, .. } => args,
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(s: &str) -> Type {
        Type::parse(s).unwrap()
    }

    #[test]
    fn test_substitute_nested() {
        let mut subst = Substitution::default();
        subst.insert("T".into(), Type::Int);
        subst.insert("K".into(), Type::String);
        assert_eq!(substitute(&ty("map[K]T[]"), &subst), ty("map[string]int[]"));
        assert_eq!(substitute(&ty("func(T): K"), &subst), ty("func(int): string"));
        assert_eq!(substitute(&ty("Box<T>|null"), &subst), ty("Box<int>|null"));
        assert_eq!(substitute(&ty("V"), &subst), ty("V"));
    }

    #[test]
    fn test_infer_type_args() {
        let subst = infer_type_args(&[ty("T[]"), ty("func(T): R")], &[ty("int[]"), ty("func(int): string")]);
        assert_eq!(subst.get("T"), Some(&Type::Int));
        assert_eq!(subst.get("R"), Some(&Type::String));
    }

    #[test]
    fn test_infer_through_nullable() {
        let subst = infer_type_args(&[ty("T|null")], &[Type::Int]);
        assert_eq!(subst.get("T"), Some(&Type::Int));
    }

    #[test]
    fn test_first_binding_wins() {
        let subst = infer_type_args(&[ty("T"), ty("T")], &[Type::Int, Type::String]);
        assert_eq!(subst.get("T"), Some(&Type::Int));
    }
}
