use kontract::api::v1alpha1::{
    Action, BlockExplorer, Contract, ContractProxy, ContractVersion, EventHook, GasStrategy, Network,
    ProxyAdmin, RPCProvider, Wallet,
};
use kube::CustomResourceExt as _;

fn main() {
    let crds = [
        Wallet::crd(),
        RPCProvider::crd(),
        BlockExplorer::crd(),
        Network::crd(),
        Contract::crd(),
        ContractVersion::crd(),
        Action::crd(),
        EventHook::crd(),
        ContractProxy::crd(),
        ProxyAdmin::crd(),
        GasStrategy::crd(),
    ];
    for (i, crd) in crds.iter().enumerate() {
        if i > 0 {
            println!("---");
        }
        print!("{}", serde_yaml::to_string(crd).unwrap());
    }
}
