//! Identity registry: participants, their contact data and balances.

use std::fmt;

use estate_store::decode_json;
use estate_types::{
    Amount, Collection, CompositeKey, DocType, IdentityHasher, Organization, Role, Timestamp,
    UserStatus,
};
use serde::{Deserialize, Serialize};

use crate::context::InvocationContext;
use crate::error::{ContractError, ContractResult};

/// Public half of a user, on the shared partition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "citizenIDHash")]
    pub citizen_id_hash: String,
    #[serde(rename = "citizenID")]
    pub citizen_id: String,
    pub name: String,
    pub organization: Organization,
    pub role: Role,
    pub status: UserStatus,
    pub create_time: Timestamp,
    pub last_update_time: Timestamp,
}

/// Private half of a user, in `UserDataCollection`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPrivate {
    #[serde(rename = "citizenIDHash")]
    pub citizen_id_hash: String,
    pub password_hash: String,
    pub phone: String,
    pub email: String,
    pub balance: Amount,
}

/// Private fields shown to the user's own organization. The password hash
/// never leaves the contract layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContact {
    pub phone: String,
    pub email: String,
    pub balance: Amount,
}

/// Merged view returned by user queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    #[serde(flatten)]
    pub contact: Option<UserContact>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    #[serde(rename = "citizenIDHash")]
    pub citizen_id_hash: String,
    pub organization: Organization,
    pub balance: Amount,
}

/// A `(citizenIDHash, organization)` pair naming one account.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AccountRef {
    pub citizen_id_hash: String,
    pub organization: Organization,
}

impl AccountRef {
    pub fn new(citizen_id_hash: impl Into<String>, organization: Organization) -> Self {
        Self {
            citizen_id_hash: citizen_id_hash.into(),
            organization,
        }
    }

    pub fn key(&self) -> ContractResult<CompositeKey> {
        Ok(CompositeKey::user(&self.citizen_id_hash, self.organization)?)
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.citizen_id_hash, self.organization)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterUser {
    pub citizen_id_hash: String,
    pub citizen_id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub password_hash: String,
    pub organization: Organization,
    pub role: Role,
    pub status: UserStatus,
    pub balance: Amount,
}

/// Self-service changes. Empty fields are left untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateUser {
    pub citizen_id_hash: String,
    pub organization: Organization,
    pub phone: String,
    pub email: String,
    pub password_hash: String,
}

/// Users service.
#[derive(Clone, Copy, Debug, Default)]
pub struct UserRegistry;

impl UserRegistry {
    pub fn register(
        &self,
        ctx: &mut InvocationContext<'_>,
        request: RegisterUser,
    ) -> ContractResult<UserView> {
        require_non_empty("citizenIDHash", &request.citizen_id_hash)?;
        require_non_empty("name", &request.name)?;
        ensure_manages(ctx, "Register", request.organization)?;

        let account = AccountRef::new(&request.citizen_id_hash, request.organization);
        let key = account.key()?;
        if ctx.txn.get_shared(&key)?.is_some() {
            return Err(ContractError::conflict(
                "Register",
                account.to_string(),
                "user already registered",
            ));
        }

        let now = ctx.now();
        let user = User {
            citizen_id_hash: request.citizen_id_hash.clone(),
            citizen_id: request.citizen_id,
            name: request.name,
            organization: request.organization,
            role: request.role,
            status: request.status,
            create_time: now,
            last_update_time: now,
        };
        let private = UserPrivate {
            citizen_id_hash: request.citizen_id_hash,
            password_hash: request.password_hash,
            phone: request.phone,
            email: request.email,
            balance: request.balance,
        };
        ctx.txn.put_shared_json(&key, &user)?;
        ctx.txn
            .put_private_json(Collection::UserData, &key, &private)?;
        tracing::info!(account = %account, role = %user.role, "user registered");
        Ok(view(ctx, user, Some(private)))
    }

    pub fn update(
        &self,
        ctx: &mut InvocationContext<'_>,
        request: UpdateUser,
    ) -> ContractResult<UserView> {
        ensure_manages(ctx, "UpdateUser", request.organization)?;
        let account = AccountRef::new(&request.citizen_id_hash, request.organization);
        let (key, mut user) = load_user(ctx, &account)?;
        let mut private = load_private(ctx, &account)?;

        merge(&mut private.phone, request.phone);
        merge(&mut private.email, request.email);
        merge(&mut private.password_hash, request.password_hash);
        user.last_update_time = ctx.now();

        ctx.txn.put_shared_json(&key, &user)?;
        ctx.txn
            .put_private_json(Collection::UserData, &key, &private)?;
        Ok(view(ctx, user, Some(private)))
    }

    pub fn get(
        &self,
        ctx: &mut InvocationContext<'_>,
        account: &AccountRef,
    ) -> ContractResult<UserView> {
        let (_, user) = load_user(ctx, account)?;
        let private = if shows_private(ctx, account.organization) {
            Some(load_private(ctx, account)?)
        } else {
            None
        };
        Ok(view(ctx, user, private))
    }

    pub fn list_by_organization(
        &self,
        ctx: &mut InvocationContext<'_>,
        organization: Organization,
    ) -> ContractResult<Vec<UserView>> {
        let users = ctx
            .scan_all_shared(&CompositeKey::namespace(DocType::User))?
            .into_iter()
            .map(|(_, bytes)| decode_json::<User>(&bytes))
            .collect::<Result<Vec<_>, _>>()?;

        let with_private = shows_private(ctx, organization);
        let mut out = Vec::new();
        for user in users.into_iter().filter(|u| u.organization == organization) {
            let private = if with_private {
                let account = AccountRef::new(&user.citizen_id_hash, organization);
                Some(load_private(ctx, &account)?)
            } else {
                None
            };
            out.push(view(ctx, user, private));
        }
        Ok(out)
    }

    pub fn balance(
        &self,
        ctx: &mut InvocationContext<'_>,
        account: &AccountRef,
    ) -> ContractResult<BalanceView> {
        let caller = ctx.organization();
        if caller != account.organization
            && !matches!(caller, Organization::Bank | Organization::Government)
        {
            return Err(ContractError::unauthorized(
                "GetBalance",
                caller.as_str(),
                "balances are visible to the owning organization, banks and government",
            ));
        }
        load_user(ctx, account)?;
        let private = load_private(ctx, account)?;
        Ok(BalanceView {
            citizen_id_hash: account.citizen_id_hash.clone(),
            organization: account.organization,
            balance: private.balance,
        })
    }

    /// Seed the configured government account.
    pub fn init_ledger(&self, ctx: &mut InvocationContext<'_>) -> ContractResult<UserView> {
        let bootstrap = ctx.config().bootstrap.clone();
        let request = RegisterUser {
            citizen_id_hash: IdentityHasher::CITIZEN.hash_hex(&bootstrap.citizen_id),
            citizen_id: bootstrap.citizen_id,
            name: bootstrap.name,
            phone: bootstrap.phone,
            email: bootstrap.email,
            password_hash: bootstrap.password_hash,
            organization: Organization::Government,
            role: Role::Government,
            status: UserStatus::Active,
            balance: bootstrap.balance,
        };
        let seeded = self.register(ctx, request).map_err(|e| match e {
            ContractError::Conflict { key, .. } => {
                ContractError::conflict("InitLedger", key, "ledger already initialized")
            }
            other => other,
        })?;
        tracing::info!(account = %seeded.user.citizen_id_hash, "ledger initialized");
        Ok(seeded)
    }
}

// ---------------------------------------------------------------------------
// Shared helpers for services that move money
// ---------------------------------------------------------------------------

pub(crate) fn load_user(
    ctx: &mut InvocationContext<'_>,
    account: &AccountRef,
) -> ContractResult<(CompositeKey, User)> {
    let key = account.key()?;
    let user = ctx
        .txn
        .get_shared_json::<User>(&key)?
        .ok_or_else(|| ContractError::not_found("user", account.to_string()))?;
    Ok((key, user))
}

fn load_private(
    ctx: &mut InvocationContext<'_>,
    account: &AccountRef,
) -> ContractResult<UserPrivate> {
    let key = account.key()?;
    ctx.txn
        .get_private_json::<UserPrivate>(Collection::UserData, &key)?
        .ok_or_else(|| ContractError::not_found("user private data", account.to_string()))
}

/// Move `amount` from one account to another.
///
/// Both balances are read inside the invocation, so a concurrent transfer
/// touching either account invalidates this one at commit.
pub(crate) fn transfer(
    ctx: &mut InvocationContext<'_>,
    payment_id: &str,
    from: &AccountRef,
    to: &AccountRef,
    amount: Amount,
) -> ContractResult<()> {
    let operation = ctx.operation().as_str();
    if amount.is_zero() {
        return Err(ContractError::validation("amount must be positive"));
    }
    if from == to {
        return Err(ContractError::validation(format!(
            "payer and receiver are the same account {from}"
        )));
    }

    let (from_key, mut payer) = load_user(ctx, from)?;
    let (to_key, mut receiver) = load_user(ctx, to)?;
    for user in [&payer, &receiver] {
        if user.status != UserStatus::Active {
            return Err(ContractError::consistency(
                operation,
                payment_id,
                format!("user {}@{} is disabled", user.citizen_id_hash, user.organization),
            ));
        }
    }

    let mut payer_private = load_private(ctx, from)?;
    let mut receiver_private = load_private(ctx, to)?;
    payer_private.balance = payer_private.balance.checked_sub(amount).ok_or_else(|| {
        ContractError::consistency(
            operation,
            payment_id,
            format!(
                "insufficient balance: {from} holds {}, needs {amount}",
                payer_private.balance
            ),
        )
    })?;
    receiver_private.balance = receiver_private
        .balance
        .checked_add(amount)
        .ok_or_else(|| ContractError::validation(format!("balance overflow crediting {to}")))?;

    let now = ctx.now();
    payer.last_update_time = now;
    receiver.last_update_time = now;
    ctx.txn.put_shared_json(&from_key, &payer)?;
    ctx.txn.put_shared_json(&to_key, &receiver)?;
    ctx.txn
        .put_private_json(Collection::UserData, &from_key, &payer_private)?;
    ctx.txn
        .put_private_json(Collection::UserData, &to_key, &receiver_private)?;
    tracing::debug!(payment = payment_id, %from, %to, %amount, "balances moved");
    Ok(())
}

fn ensure_manages(
    ctx: &InvocationContext<'_>,
    operation: &str,
    organization: Organization,
) -> ContractResult<()> {
    let caller = ctx.organization();
    if caller == organization || caller == Organization::Government {
        return Ok(());
    }
    Err(ContractError::unauthorized(
        operation,
        caller.as_str(),
        format!("cannot manage users of {organization}"),
    ))
}

fn shows_private(ctx: &InvocationContext<'_>, organization: Organization) -> bool {
    ctx.organization() == organization && ctx.txn.can_access(Collection::UserData)
}

fn view(ctx: &InvocationContext<'_>, user: User, private: Option<UserPrivate>) -> UserView {
    let contact = private
        .filter(|_| shows_private(ctx, user.organization))
        .map(|p| UserContact {
            phone: p.phone,
            email: p.email,
            balance: p.balance,
        });
    UserView { user, contact }
}

fn merge(field: &mut String, value: String) {
    if !value.trim().is_empty() {
        *field = value;
    }
}

pub(crate) fn require_non_empty(name: &str, value: &str) -> ContractResult<()> {
    if value.trim().is_empty() {
        return Err(ContractError::validation(format!("{name} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::testkit::*;

    #[test]
    fn register_returns_private_view_to_own_organization() {
        let h = Harness::new();
        let view = h.register("H1", INV, 250);
        assert_eq!(view["citizenIDHash"], "H1");
        assert_eq!(view["organization"], "InvestorMSP");
        assert_eq!(view["role"], "INVESTOR");
        assert_eq!(view["status"], "ACTIVE");
        assert_eq!(view["balance"], 250);
        assert!(view.get("passwordHash").is_none());
    }

    #[test]
    fn duplicate_registration_conflicts_and_writes_nothing() {
        let h = Harness::new();
        h.register("H1", INV, 10);
        let height = h.height();
        let err = h
            .call(INV, "Register", &["H1", "ID", "X", "", "", "pw", "InvestorMSP", "", "", "99"])
            .unwrap_err();
        assert_eq!(err.kind(), "ConflictError");
        assert_eq!(h.height(), height);
        assert_eq!(h.balance("H1"), 10);
    }

    #[test]
    fn same_citizen_may_register_in_two_organizations() {
        let h = Harness::new();
        h.register("H1", INV, 0);
        h.register("H1", BNK, 0);
        let listed = h.call(BNK, "ListUsersByOrganization", &["BankMSP"]).unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[test]
    fn cannot_register_users_of_another_organization() {
        let h = Harness::new();
        let err = h
            .call(BNK, "Register", &["H1", "ID", "X", "", "", "pw", "InvestorMSP", "", "", "0"])
            .unwrap_err();
        assert_eq!(err.kind(), "AuthorizationError");
        // The land registry may.
        h.call(GOV, "Register", &["H1", "ID", "X", "", "", "pw", "InvestorMSP", "", "", "0"])
            .unwrap();
    }

    #[test]
    fn private_fields_only_for_own_organization() {
        let h = Harness::new();
        h.register("H1", INV, 75);
        let own = h
            .call(INV, "GetUserByCitizenIDAndOrganization", &["H1", "InvestorMSP"])
            .unwrap();
        assert_eq!(own["phone"], "555");
        assert_eq!(own["balance"], 75);

        let other = h
            .call(TPY, "GetUserByCitizenIDAndOrganization", &["H1", "InvestorMSP"])
            .unwrap();
        assert_eq!(other["name"], "H1");
        assert!(other.get("phone").is_none());
        assert!(other.get("balance").is_none());
    }

    #[test]
    fn update_merges_non_empty_fields() {
        let h = Harness::new();
        h.register("H1", INV, 0);
        let updated = h
            .call(INV, "UpdateUser", &["H1", "InvestorMSP", "", "new@mail", ""])
            .unwrap();
        assert_eq!(updated["phone"], "555");
        assert_eq!(updated["email"], "new@mail");
        assert_ne!(updated["lastUpdateTime"], updated["createTime"]);

        let err = h
            .call(INV, "UpdateUser", &["nobody", "InvestorMSP", "1", "", ""])
            .unwrap_err();
        assert_eq!(err.kind(), "NotFoundError");
    }

    #[test]
    fn list_filters_by_organization() {
        let h = Harness::new();
        h.register("H1", INV, 0);
        h.register("H2", INV, 0);
        h.register("B1", BNK, 0);
        let investors = h.call(TPY, "ListUsersByOrganization", &["InvestorMSP"]).unwrap();
        let investors = investors.as_array().unwrap();
        assert_eq!(investors.len(), 2);
        assert!(investors.iter().all(|u| u.get("balance").is_none()));

        let own = h.call(INV, "ListUsersByOrganization", &["InvestorMSP"]).unwrap();
        assert!(own.as_array().unwrap().iter().all(|u| u.get("balance").is_some()));
    }

    #[test]
    fn balance_visibility() {
        let h = Harness::new();
        h.register("H1", INV, 42);
        assert_eq!(h.balance("H1"), 42);
        h.call(GOV, "GetBalance", &["H1", "InvestorMSP"]).unwrap();
        h.call(INV, "GetBalance", &["H1", "InvestorMSP"]).unwrap();
        let err = h.call(TPY, "GetBalance", &["H1", "InvestorMSP"]).unwrap_err();
        assert_eq!(err.kind(), "AuthorizationError");
    }

    #[test]
    fn init_ledger_seeds_once() {
        let h = Harness::new();
        let seeded = h.call(GOV, "InitLedger", &[]).unwrap();
        assert_eq!(seeded["organization"], "GovernmentMSP");
        assert_eq!(seeded["role"], "GOVERNMENT");
        let err = h.call(GOV, "InitLedger", &[]).unwrap_err();
        assert_eq!(err.kind(), "ConflictError");
        let err = h.call(INV, "InitLedger", &[]).unwrap_err();
        assert_eq!(err.kind(), "AuthorizationError");
    }

    #[test]
    fn disabled_user_cannot_pay() {
        let h = Harness::new();
        h.call(INV, "Register", &["H1", "ID", "X", "", "", "pw", "InvestorMSP", "", "DISABLED", "100"])
            .unwrap();
        h.register("H2", INV, 0);
        let err = h
            .call(
                INV,
                "CreatePayment",
                &["P1", "10", "H1", "InvestorMSP", "H2", "InvestorMSP", "CASH"],
            )
            .unwrap_err();
        assert_eq!(err.kind(), "ConsistencyError");
        assert!(err.to_string().contains("disabled"));
    }
}
