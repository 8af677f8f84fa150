//! Category tree maintenance: depth-limited nesting, re-parenting, cascading delete.

use std::collections::{HashSet, VecDeque};

use tracing::info;
use uuid::Uuid;
use walletbook_domain::{Book, Category, CategoryKind, MAX_CATEGORY_DEPTH};

use crate::CoreError;

/// Upper bound on parent-link hops before a chain is considered cyclic.
pub const MAX_DEPTH_WALK: usize = 10;

pub struct CategoryService;

impl CategoryService {
    /// Inserts a new category, enforcing the nesting limit against its parent.
    pub fn add(book: &mut Book, mut category: Category) -> Result<Uuid, CoreError> {
        category.name = normalized_name(&category.name)?;
        if book.category(category.id).is_some() {
            return Err(CoreError::Validation(format!(
                "Category id {} already exists",
                category.id
            )));
        }
        if let Some(parent_id) = category.parent_id {
            let parent = book
                .category(parent_id)
                .ok_or(CoreError::CategoryNotFound(parent_id))?;
            ensure_same_kind(parent, category.kind)?;
            let parent_depth = Self::depth(book, parent_id).ok_or_else(cyclic_error)?;
            if parent_depth >= MAX_CATEGORY_DEPTH {
                return Err(CoreError::Validation(format!(
                    "Categories can be nested at most {} levels deep",
                    MAX_CATEGORY_DEPTH
                )));
            }
        }
        ensure_unique_sibling(book, None, category.parent_id, category.kind, &category.name)?;

        let id = category.id;
        info!(category = %category.name, %id, "category added");
        book.categories.push(category);
        Ok(id)
    }

    pub fn rename(book: &mut Book, id: Uuid, name: &str) -> Result<(), CoreError> {
        let name = normalized_name(name)?;
        let (parent_id, kind) = {
            let category = book.category(id).ok_or(CoreError::CategoryNotFound(id))?;
            (category.parent_id, category.kind)
        };
        ensure_unique_sibling(book, Some(id), parent_id, kind, &name)?;
        if let Some(category) = book.category_mut(id) {
            info!(%id, from = %category.name, to = %name, "category renamed");
            category.name = name;
        }
        Ok(())
    }

    pub fn set_icon(book: &mut Book, id: Uuid, icon: Option<String>) -> Result<(), CoreError> {
        let category = book.category_mut(id).ok_or(CoreError::CategoryNotFound(id))?;
        category.icon = icon.filter(|value| !value.trim().is_empty());
        Ok(())
    }

    /// Re-parents `id` (and its subtree) under `new_parent`, or makes it a root.
    pub fn move_to(book: &mut Book, id: Uuid, new_parent: Option<Uuid>) -> Result<(), CoreError> {
        let (name, kind) = {
            let category = book.category(id).ok_or(CoreError::CategoryNotFound(id))?;
            (category.name.clone(), category.kind)
        };
        let height = Self::subtree_height(book, id);
        if let Some(parent_id) = new_parent {
            if parent_id == id {
                return Err(CoreError::Validation(
                    "Category cannot be its own parent".into(),
                ));
            }
            let parent = book
                .category(parent_id)
                .ok_or(CoreError::CategoryNotFound(parent_id))?;
            ensure_same_kind(parent, kind)?;
            if Self::descendants(book, id).contains(&parent_id) {
                return Err(CoreError::Validation(
                    "Category cannot be moved under one of its descendants".into(),
                ));
            }
            let parent_depth = Self::depth(book, parent_id).ok_or_else(cyclic_error)?;
            if parent_depth + height > MAX_CATEGORY_DEPTH {
                return Err(CoreError::Validation(format!(
                    "Moving `{}` would nest categories deeper than {} levels",
                    name, MAX_CATEGORY_DEPTH
                )));
            }
        } else if height > MAX_CATEGORY_DEPTH {
            return Err(CoreError::Validation(format!(
                "Category `{}` is already nested deeper than {} levels",
                name, MAX_CATEGORY_DEPTH
            )));
        }
        ensure_unique_sibling(book, Some(id), new_parent, kind, &name)?;

        if let Some(category) = book.category_mut(id) {
            category.parent_id = new_parent;
        }
        info!(%id, parent = ?new_parent, "category moved");
        Ok(())
    }

    /// Removes the category and every descendant; returns the removed ids.
    pub fn delete(book: &mut Book, id: Uuid) -> Result<Vec<Uuid>, CoreError> {
        if book.category(id).is_none() {
            return Err(CoreError::CategoryNotFound(id));
        }
        let mut doomed = vec![id];
        doomed.extend(Self::descendants(book, id));
        let doomed_set: HashSet<Uuid> = doomed.iter().copied().collect();

        let referencing = book
            .transactions
            .iter()
            .filter(|txn| doomed_set.contains(&txn.category_id))
            .count();
        if referencing > 0 {
            return Err(CoreError::Validation(format!(
                "Category is used by {} transaction(s) and cannot be deleted",
                referencing
            )));
        }

        book.categories
            .retain(|category| !doomed_set.contains(&category.id));
        for wallet in &mut book.wallets {
            wallet
                .linked_category_ids
                .retain(|linked| !doomed_set.contains(linked));
        }
        info!(%id, removed = doomed.len(), "category deleted");
        Ok(doomed)
    }

    /// Level of the category in its tree (roots are 1). `None` when the id is
    /// unknown or the parent chain does not terminate within [`MAX_DEPTH_WALK`].
    pub fn depth(book: &Book, id: Uuid) -> Option<usize> {
        let mut current = book.category(id)?;
        let mut depth = 1;
        while let Some(parent_id) = current.parent_id {
            if depth >= MAX_DEPTH_WALK {
                return None;
            }
            match book.category(parent_id) {
                Some(parent) => {
                    current = parent;
                    depth += 1;
                }
                None => break,
            }
        }
        Some(depth)
    }

    /// Number of levels in the subtree rooted at `id`, counting `id` itself.
    pub fn subtree_height(book: &Book, id: Uuid) -> usize {
        let mut height = 0;
        let mut level = vec![id];
        let mut seen = HashSet::new();
        while !level.is_empty() && height < MAX_DEPTH_WALK {
            height += 1;
            let mut next = Vec::new();
            for node in level {
                if !seen.insert(node) {
                    continue;
                }
                next.extend(
                    book.categories
                        .iter()
                        .filter(|category| category.parent_id == Some(node))
                        .map(|category| category.id),
                );
            }
            level = next;
        }
        height
    }

    pub fn children(book: &Book, id: Uuid) -> Vec<&Category> {
        book.categories
            .iter()
            .filter(|category| category.parent_id == Some(id))
            .collect()
    }

    pub fn roots(book: &Book, kind: Option<CategoryKind>) -> Vec<&Category> {
        book.categories
            .iter()
            .filter(|category| category.is_root())
            .filter(|category| kind.map_or(true, |wanted| category.kind == wanted))
            .collect()
    }

    /// All transitive children of `id`, breadth first, excluding `id`.
    pub fn descendants(book: &Book, id: Uuid) -> Vec<Uuid> {
        let mut found = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        while let Some(node) = queue.pop_front() {
            for child in book
                .categories
                .iter()
                .filter(|category| category.parent_id == Some(node))
            {
                if seen.insert(child.id) {
                    found.push(child.id);
                    queue.push_back(child.id);
                }
            }
        }
        found
    }

    /// Parent chain of `id`, nearest first.
    pub fn ancestors(book: &Book, id: Uuid) -> Vec<Uuid> {
        let mut chain = Vec::new();
        let mut cursor = book.category(id).and_then(|category| category.parent_id);
        while let Some(parent_id) = cursor {
            if chain.len() >= MAX_DEPTH_WALK || chain.contains(&parent_id) || parent_id == id {
                break;
            }
            chain.push(parent_id);
            cursor = book.category(parent_id).and_then(|category| category.parent_id);
        }
        chain
    }

    /// Top-most existing ancestor, or the category itself when it is a root.
    pub fn root_of(book: &Book, id: Uuid) -> Option<Uuid> {
        book.category(id)?;
        Some(
            Self::ancestors(book, id)
                .into_iter()
                .rev()
                .find(|ancestor| book.category(*ancestor).is_some())
                .unwrap_or(id),
        )
    }

    /// Breadcrumb label such as `Food > Groceries`.
    pub fn path_label(book: &Book, id: Uuid) -> Option<String> {
        let leaf = book.category(id)?;
        let mut names: Vec<&str> = Self::ancestors(book, id)
            .into_iter()
            .filter_map(|ancestor| book.category(ancestor))
            .map(|category| category.name.as_str())
            .collect();
        names.reverse();
        names.push(leaf.name.as_str());
        Some(names.join(" > "))
    }

    /// Seeds the default tree when the book has no categories yet.
    pub fn seed_defaults(book: &mut Book) -> usize {
        if !book.categories.is_empty() {
            return 0;
        }
        book.categories = default_categories();
        info!(count = book.categories.len(), "default categories seeded");
        book.categories.len()
    }
}

/// Starter tree for a fresh book.
pub fn default_categories() -> Vec<Category> {
    let mut categories = Vec::new();
    let mut root = |name: &str, kind: CategoryKind, icon: &str, children: &[(&str, &str)]| {
        let parent = Category::new(name, kind).with_icon(icon);
        let parent_id = parent.id;
        categories.push(parent);
        for (child, child_icon) in children {
            categories.push(
                Category::new(*child, kind)
                    .with_parent(parent_id)
                    .with_icon(*child_icon),
            );
        }
    };

    root("Salary", CategoryKind::Income, "💼", &[]);
    root("Bonus", CategoryKind::Income, "🎁", &[]);
    root("Investment", CategoryKind::Income, "📈", &[("Dividends", "💵")]);
    root(
        "Food",
        CategoryKind::Expense,
        "🍽️",
        &[("Groceries", "🛒"), ("Restaurants", "🍜")],
    );
    root(
        "Transport",
        CategoryKind::Expense,
        "🚌",
        &[("Fuel", "⛽"), ("Public transit", "🚇")],
    );
    root(
        "Housing",
        CategoryKind::Expense,
        "🏠",
        &[("Rent", "🔑"), ("Utilities", "💡")],
    );
    root("Shopping", CategoryKind::Expense, "🛍️", &[]);
    root("Health", CategoryKind::Expense, "💊", &[]);
    root("Entertainment", CategoryKind::Expense, "🎬", &[]);
    root("Education", CategoryKind::Expense, "📚", &[]);
    categories
}

fn normalized_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Category name is required".into()));
    }
    Ok(trimmed.to_string())
}

fn ensure_same_kind(parent: &Category, kind: CategoryKind) -> Result<(), CoreError> {
    if parent.kind != kind {
        return Err(CoreError::Validation(format!(
            "{} category cannot be nested under {} category `{}`",
            kind, parent.kind, parent.name
        )));
    }
    Ok(())
}

fn ensure_unique_sibling(
    book: &Book,
    exclude: Option<Uuid>,
    parent_id: Option<Uuid>,
    kind: CategoryKind,
    candidate: &str,
) -> Result<(), CoreError> {
    let normalized = candidate.trim().to_lowercase();
    let duplicate = book.categories.iter().any(|category| {
        category.parent_id == parent_id
            && category.kind == kind
            && category.name.trim().to_lowercase() == normalized
            && exclude.map_or(true, |id| category.id != id)
    });
    if duplicate {
        Err(CoreError::Validation(format!(
            "Category `{}` already exists",
            candidate
        )))
    } else {
        Ok(())
    }
}

fn cyclic_error() -> CoreError {
    CoreError::Validation("Category tree contains a cycle".into())
}
