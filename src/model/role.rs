#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Member,
    Admin,
}

impl Role {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "member" => Some(Role::Member),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}
